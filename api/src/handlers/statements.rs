use crate::handlers::error_encountered;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

/// Fallback when no statement is configured
const DEFAULT_STATEMENT: &str = "SHOW DATABASES";

/// Execute the configured statement in a fresh session.
///
/// The statement comes from configuration, not from the request body; the
/// caller only learns whether the run completed.
#[tracing::instrument(skip(state))]
pub async fn execute_statement(State(state): State<AppState>) -> Response {
    let statement = state
        .config
        .warehouse
        .statement
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STATEMENT);

    match state.pipeline.run_statement(statement).await {
        Ok(result) => {
            info!(rows = result.row_count(), "Configured statement complete");
            (StatusCode::OK, "Complete").into_response()
        }
        Err(e) => {
            error!(error = %e, "Configured statement failed");
            error_encountered()
        }
    }
}
