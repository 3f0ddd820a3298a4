use std::sync::Arc;

use common::config::Settings;
use common::pipeline::Pipeline;
use common::vault::SecretStore;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub secrets: Arc<dyn SecretStore>,
    pub config: Arc<Settings>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(
        pipeline: Arc<Pipeline>,
        secrets: Arc<dyn SecretStore>,
        config: Arc<Settings>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            pipeline,
            secrets,
            config,
            metrics_handle,
        }
    }
}
