//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::analysis::SchemaAnalyzer;
use crate::config::Settings;
use crate::storage::StorageBackend;
use crate::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,

    /// Analysis pipeline, configured with the impact thresholds from settings
    pub analyzer: SchemaAnalyzer,

    /// Result and metrics persistence
    pub storage: Arc<dyn StorageBackend>,

    /// Render handle for `/metrics`; `None` when no recorder could be installed
    pub metrics: Option<PrometheusHandle>,

    /// Budget for storage work inside a request, kept under the request timeout
    pub storage_timeout: Duration,
}

impl AppState {
    pub fn new(
        settings: Settings,
        storage: Arc<dyn StorageBackend>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let analyzer = SchemaAnalyzer::new(settings.analysis.thresholds)
            .with_query_timer(telemetry::record_query_processing);

        let storage_timeout = settings
            .storage
            .operation_timeout()
            .min(settings.server.request_timeout() / 2);

        Self {
            settings,
            analyzer,
            storage,
            metrics,
            storage_timeout,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
