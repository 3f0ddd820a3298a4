use crate::handlers::error_encountered;
use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info};

/// List the databases visible to the configured warehouse identity.
///
/// Runs `SHOW DATABASES` in a fresh session and returns the `name` column as
/// a JSON array of strings.
#[tracing::instrument(skip(state))]
pub async fn list_databases(State(state): State<AppState>) -> Response {
    match state.pipeline.run_statement("SHOW DATABASES").await {
        Ok(result) => {
            let names = result.column_values("name");
            info!(count = names.len(), "Database listing complete");
            Json(names).into_response()
        }
        Err(e) => {
            error!(error = %e, "Database listing failed");
            error_encountered()
        }
    }
}
