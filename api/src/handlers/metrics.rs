use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};

/// Prometheus metrics endpoint
#[tracing::instrument(skip(state))]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics_handle.render())
}
