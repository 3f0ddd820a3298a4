// Storage-event consumer loop for NATS JetStream

use crate::errors::QueueError;
use crate::pipeline::{Pipeline, PipelineOutcome};
use crate::queue::nats::NatsClient;
use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::Message;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, instrument, warn};

/// NATS-backed consumer that feeds storage events into the pipeline.
///
/// Delivery is at-most-once from the pipeline's perspective: every message is
/// acknowledged whether processing succeeds or fails, because all pipeline
/// failures are terminal for the invocation and there are no retries.
pub struct EventConsumer {
    consumer: PullConsumer,
    pipeline: Arc<Pipeline>,
    shutdown_flag: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
}

impl EventConsumer {
    /// Create a new event consumer over the client's durable consumer
    #[instrument(skip(client, pipeline))]
    pub async fn new(client: &NatsClient, pipeline: Arc<Pipeline>) -> Result<Self, QueueError> {
        info!("Creating storage-event consumer");

        let consumer = client.get_or_create_consumer().await?;

        Ok(Self {
            consumer,
            pipeline,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
        })
    }

    /// Process a single message and acknowledge it unconditionally
    #[instrument(skip(self, message), fields(
        stream_sequence = ?message.info().map(|i| i.stream_sequence),
    ))]
    async fn process_message(&self, message: Message) -> Result<(), QueueError> {
        match self.pipeline.handle_event(&message.payload).await {
            Ok(PipelineOutcome::Completed(result)) => {
                info!(rows = result.row_count(), "Event processed successfully");
            }
            Ok(PipelineOutcome::Skipped) => {
                info!("Event skipped: location does not match the configured endpoint");
            }
            Err(e) => {
                // Terminal for this invocation; detail was already logged at
                // the point of detection.
                error!(error = %e, "Event processing failed");
            }
        }

        message
            .ack()
            .await
            .map_err(|e| QueueError::AckFailed(format!("Failed to acknowledge message: {}", e)))?;

        Ok(())
    }

    /// Start consuming events. Returns when shutdown is requested.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), QueueError> {
        info!("Starting storage-event consumer");

        let mut messages = self.consumer.messages().await.map_err(|e| {
            QueueError::ConsumeFailed(format!("Failed to create message stream: {}", e))
        })?;

        info!("Consumer started, waiting for messages");

        loop {
            if self.shutdown_flag.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping consumer");
                break;
            }

            tokio::select! {
                message_result = messages.next() => {
                    match message_result {
                        Some(Ok(message)) => {
                            if let Err(e) = self.process_message(message).await {
                                error!(error = %e, "Failed to process message");
                                // Continue processing other messages
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Error receiving message");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                        None => {
                            warn!("Message stream ended unexpectedly");
                            break;
                        }
                    }
                }
                _ = self.shutdown_notify.notified() => {
                    info!("Shutdown notification received");
                    break;
                }
                // Timeout to check the shutdown flag periodically
                _ = tokio::time::sleep(Duration::from_secs(5)) => {
                    continue;
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    /// Request graceful shutdown
    pub fn shutdown(&self) {
        info!("Requesting consumer shutdown");
        self.shutdown_flag.store(true, Ordering::Relaxed);
        self.shutdown_notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_flag() {
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        assert!(!shutdown_flag.load(Ordering::Relaxed));

        shutdown_flag.store(true, Ordering::Relaxed);
        assert!(shutdown_flag.load(Ordering::Relaxed));
    }
}
