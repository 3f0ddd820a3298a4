use crate::handlers::error_encountered;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::provision;
use tracing::{error, info};

/// Provision the configured private key into the vault under a name derived
/// from the warehouse user. Independent of the ingestion pipeline; the key
/// text never appears in the response or the logs.
#[tracing::instrument(skip(state))]
pub async fn provision_secret(State(state): State<AppState>) -> Response {
    let Some(key_text) = state
        .config
        .warehouse
        .private_key_pem
        .as_deref()
        .filter(|k| !k.is_empty())
    else {
        error!("No private key configured to provision");
        return error_encountered();
    };

    match provision::provision_private_key(
        state.secrets.as_ref(),
        &state.config.warehouse.user,
        key_text,
    )
    .await
    {
        Ok(name) => {
            info!(secret_name = %name, "Secret provisioned");
            (StatusCode::OK, "Success").into_response()
        }
        Err(e) => {
            error!(error = %e, "Secret provisioning failed");
            error_encountered()
        }
    }
}
