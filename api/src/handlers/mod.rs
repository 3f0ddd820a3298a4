pub mod databases;
pub mod health;
pub mod metrics;
pub mod secrets;
pub mod statements;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// The uniform failure response. Every handler failure surfaces as this
/// plaintext body with a success-shaped status; detail goes to the logs, not
/// to the caller.
pub fn error_encountered() -> Response {
    (StatusCode::OK, "Error encountered").into_response()
}
