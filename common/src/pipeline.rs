// The ingestion pipeline: event → location → fetch → validate → credential →
// execute. One invocation per event, no shared mutable state between
// invocations.

use crate::config::Settings;
use crate::credential::CredentialSpec;
use crate::errors::PipelineError;
use crate::event::{self, Resolution};
use crate::payload;
use crate::storage::{self, ObjectStore};
use crate::telemetry;
use crate::vault::SecretStore;
use crate::warehouse::{SessionDriver, StatementResult, StatementRunner};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Outcome of one pipeline invocation. `Skipped` is the clean early return
/// for events whose location does not match the configured storage endpoint.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(StatementResult),
    Skipped,
}

/// Invocation-scoped orchestrator over the pipeline stages. Credentials are
/// re-resolved and sessions re-opened on every call; nothing is cached
/// across invocations.
#[derive(Clone)]
pub struct Pipeline {
    settings: Arc<Settings>,
    store: Arc<dyn ObjectStore>,
    secrets: Arc<dyn SecretStore>,
    runner: StatementRunner,
}

impl Pipeline {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretStore>,
        driver: Arc<dyn SessionDriver>,
    ) -> Self {
        Self {
            settings,
            store,
            secrets,
            runner: StatementRunner::new(driver),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process one raw queue message end to end, recording outcome metrics.
    /// Every failure is terminal for the invocation; no retries.
    #[instrument(skip(self, message), fields(message_bytes = message.len()))]
    pub async fn handle_event(&self, message: &[u8]) -> Result<PipelineOutcome, PipelineError> {
        match self.process_event(message).await {
            Ok(PipelineOutcome::Skipped) => {
                telemetry::record_event_skipped();
                Ok(PipelineOutcome::Skipped)
            }
            Ok(outcome) => {
                telemetry::record_pipeline_success();
                Ok(outcome)
            }
            Err(e) => {
                telemetry::record_pipeline_failure(e.stage());
                error!(error = %e, stage = e.stage(), "Pipeline invocation failed");
                Err(e)
            }
        }
    }

    async fn process_event(&self, message: &[u8]) -> Result<PipelineOutcome, PipelineError> {
        let payload = event::parse_event(message)?;
        info!(message_id = %payload.id, "Received new message from queue");

        let location =
            match event::resolve_location(&payload, &self.settings.storage.endpoint)? {
                Resolution::Proceed(location) => location,
                Resolution::Skip => return Ok(PipelineOutcome::Skipped),
            };

        let json = storage::fetch_json_object(self.store.as_ref(), &location).await?;
        let job = payload::extract_statement(&json)?;

        let result = self.run_statement(&job.statement).await?;
        Ok(PipelineOutcome::Completed(result))
    }

    /// Resolve the configured credential strategy and execute one statement.
    /// Used by the event pipeline and by the HTTP-triggered flows, which
    /// supply the statement from configuration instead of a fetched object.
    #[instrument(skip(self, statement))]
    pub async fn run_statement(&self, statement: &str) -> Result<StatementResult, PipelineError> {
        let spec = CredentialSpec::from_config(&self.settings.warehouse)?;
        let params = spec.materialize(self.secrets.as_ref()).await?;

        let start = Instant::now();
        let result = self.runner.run(&params, statement).await?;
        telemetry::record_statement_duration(start.elapsed().as_secs_f64());

        Ok(result)
    }
}
