use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

mod handlers;
mod routes;
mod state;

use common::config::Settings;
use common::pipeline::Pipeline;
use common::storage::BlobStoreClient;
use common::telemetry;
use common::vault::KeyVaultClient;
use common::warehouse::SnowflakeRestDriver;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Settings::load()?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation error: {}", e))?;

    // Initialize tracing
    telemetry::init_logging(
        &config.observability.log_level,
        config.observability.tracing_endpoint.as_deref(),
    )?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting API server"
    );

    let config = Arc::new(config);

    // Initialize the object storage client
    let store = BlobStoreClient::new(&config.storage)?;
    tracing::info!("Object storage client initialized");

    // Initialize the secret vault client
    let secrets = Arc::new(KeyVaultClient::new(&config.vault)?);
    tracing::info!("Vault client initialized");

    // Initialize the warehouse session driver and pipeline
    let driver = SnowflakeRestDriver::new(config.warehouse.base_url.clone())?;
    let pipeline = Arc::new(Pipeline::new(
        config.clone(),
        Arc::new(store),
        secrets.clone(),
        Arc::new(driver),
    ));
    tracing::info!("Pipeline initialized");

    // Initialize Prometheus metrics exporter
    let metrics_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    tracing::info!(port = %config.observability.metrics_port, "Metrics exporter initialized");

    // Create application state
    let app_state = AppState::new(pipeline, secrets, config.clone(), metrics_handle);

    // Create router
    let app = routes::create_router(app_state);

    // Start server
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry::shutdown_tracer();

    tracing::info!("API server stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
