// Worker binary entry point: consumes storage events from the queue and runs
// them through the ingestion pipeline.

use anyhow::Result;
use common::config::Settings;
use common::pipeline::Pipeline;
use common::queue::{EventConsumer, NatsClient};
use common::storage::BlobStoreClient;
use common::telemetry;
use common::vault::KeyVaultClient;
use common::warehouse::SnowflakeRestDriver;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation error: {}", e))?;

    // Initialize logging and metrics
    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!("Starting SnowRelay worker");
    info!("Configuration loaded successfully");

    let settings = Arc::new(settings);

    // Initialize the object storage client
    let store = BlobStoreClient::new(&settings.storage).map_err(|e| {
        error!(error = %e, "Failed to initialize object storage client");
        anyhow::anyhow!("Storage initialization error: {}", e)
    })?;

    info!("Object storage client initialized");

    // Initialize the secret vault client. Unconfigured is fine as long as no
    // vault-backed credential strategy is selected; validation above enforces
    // the cross-field constraint.
    let secrets = KeyVaultClient::new(&settings.vault).map_err(|e| {
        error!(error = %e, "Failed to initialize vault client");
        anyhow::anyhow!("Vault initialization error: {}", e)
    })?;

    info!("Vault client initialized");

    // Initialize the warehouse session driver
    let driver = SnowflakeRestDriver::new(settings.warehouse.base_url.clone()).map_err(|e| {
        error!(error = %e, "Failed to initialize warehouse driver");
        anyhow::anyhow!("Warehouse driver initialization error: {}", e)
    })?;

    let pipeline = Arc::new(Pipeline::new(
        settings.clone(),
        Arc::new(store),
        Arc::new(secrets),
        Arc::new(driver),
    ));

    info!("Pipeline initialized");

    // Initialize the NATS client and the storage-event stream
    let nats_client = NatsClient::new(settings.queue.clone()).await.map_err(|e| {
        error!(error = %e, "Failed to initialize NATS client");
        anyhow::anyhow!("NATS initialization error: {}", e)
    })?;

    nats_client.initialize_stream().await.map_err(|e| {
        error!(error = %e, "Failed to initialize storage-event stream");
        anyhow::anyhow!("Stream initialization error: {}", e)
    })?;

    info!("NATS client initialized");

    // Create the event consumer
    let consumer = Arc::new(
        EventConsumer::new(&nats_client, pipeline)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to create event consumer");
                anyhow::anyhow!("Consumer creation error: {}", e)
            })?,
    );

    info!("Event consumer created, starting event processing");

    // Start the consumer in a separate task
    let consumer_task = consumer.clone();
    let consumer_handle = tokio::spawn(async move {
        if let Err(e) = consumer_task.start().await {
            error!(error = %e, "Event consumer error");
        }
    });

    // Wait for shutdown signal
    info!("Worker is running. Press Ctrl+C to shutdown gracefully");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, initiating graceful shutdown");
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    }

    consumer.shutdown();

    // Wait for in-flight event processing to complete
    info!("Waiting for consumer to complete in-flight events");
    let _ = consumer_handle.await;

    telemetry::shutdown_tracer();

    info!("Worker shutdown complete");
    Ok(())
}
