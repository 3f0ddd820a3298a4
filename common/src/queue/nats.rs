// NATS JetStream client for the storage-event stream

use crate::config::QueueConfig;
use crate::errors::QueueError;
use async_nats::jetstream::{
    consumer::PullConsumer,
    stream::{Config as StreamConfig, Stream},
    Context as JetStreamContext,
};
use std::time::Duration;
use tracing::{info, instrument};

/// NATS JetStream client
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: JetStreamContext,
    config: QueueConfig,
}

impl NatsClient {
    /// Create a new NATS client and connect to the server
    #[instrument(skip(config), fields(url = %config.url))]
    pub async fn new(config: QueueConfig) -> Result<Self, QueueError> {
        info!("Connecting to NATS server");

        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS server successfully");

        let jetstream = async_nats::jetstream::new(client.clone());

        Ok(Self {
            client,
            jetstream,
            config,
        })
    }

    /// Initialize the storage-event stream
    #[instrument(skip(self))]
    pub async fn initialize_stream(&self) -> Result<Stream, QueueError> {
        info!(
            stream_name = %self.config.stream_name,
            "Initializing JetStream stream"
        );

        let stream_config = StreamConfig {
            name: self.config.stream_name.clone(),
            subjects: vec![self.config.subject.clone()],
            max_age: Duration::from_secs(self.config.max_age_seconds),
            max_messages: self.config.max_messages,
            ..Default::default()
        };

        let stream = self
            .jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| QueueError::StreamCreation(format!("Failed to create stream: {}", e)))?;

        info!(
            stream_name = %self.config.stream_name,
            "Stream initialized successfully"
        );

        Ok(stream)
    }

    /// Create or get the durable pull consumer for event processing.
    ///
    /// `max_deliver` is 1: messages are delivered at most once and all
    /// processing failures are terminal for the invocation, with no
    /// redelivery.
    #[instrument(skip(self))]
    pub async fn get_or_create_consumer(&self) -> Result<PullConsumer, QueueError> {
        info!(
            consumer_name = %self.config.consumer_name,
            "Creating consumer"
        );

        let stream = self
            .jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|e| QueueError::StreamNotFound(format!("Stream not found: {}", e)))?;

        let consumer_config = async_nats::jetstream::consumer::pull::Config {
            durable_name: Some(self.config.consumer_name.clone()),
            ack_policy: async_nats::jetstream::consumer::AckPolicy::Explicit,
            max_deliver: 1,
            ack_wait: Duration::from_secs(300),
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(&self.config.consumer_name, consumer_config)
            .await
            .map_err(|e| {
                QueueError::ConsumerCreation(format!("Failed to create consumer: {}", e))
            })?;

        info!(
            consumer_name = %self.config.consumer_name,
            "Consumer created successfully"
        );

        Ok(consumer)
    }

    /// Get the JetStream context for publishing/consuming
    pub fn jetstream(&self) -> &JetStreamContext {
        &self.jetstream
    }

    /// Get the NATS client
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Get the configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Health check - verify connection is alive
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), QueueError> {
        self.jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|e| QueueError::StreamNotFound(format!("Health check failed: {}", e)))?;

        Ok(())
    }
}
