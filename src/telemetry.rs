//! Prometheus metrics
//!
//! Recording never fails the caller: without an installed recorder every macro is
//! a no-op, and installation errors are only logged.

use crate::analysis::SchemaShapeError;
use crate::storage::StorageError;
use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};
use tracing::warn;

const ANALYSIS_DURATION: &str = "schema_analysis_duration_seconds";
const ANALYSIS_ERRORS: &str = "schema_analysis_errors_total";
const ACTIVE_ANALYSES: &str = "schema_analysis_active";
const QUERY_PROCESSING_TIME: &str = "schema_query_processing_seconds";
const STORAGE_OPERATIONS: &str = "schema_storage_operations_total";
const STORAGE_ERRORS: &str = "schema_storage_errors_total";

/// Install the global Prometheus recorder
pub fn init_metrics() -> Option<PrometheusHandle> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(ANALYSIS_DURATION.to_string()),
            &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0],
        )
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Full(QUERY_PROCESSING_TIME.to_string()),
                &[0.01, 0.05, 0.1, 0.5, 1.0],
            )
        });

    match builder.and_then(|b| b.install_recorder()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder unavailable, continuing without metrics: {}", e);
            None
        }
    }
}

/// Error types that can be counted under an `error_type` label
pub trait ErrorLabel {
    fn error_label(&self) -> &'static str;
}

impl ErrorLabel for SchemaShapeError {
    fn error_label(&self) -> &'static str {
        "schema_shape_error"
    }
}

impl ErrorLabel for StorageError {
    fn error_label(&self) -> &'static str {
        match self {
            StorageError::CreatePool(_) | StorageError::Pool(_) => "pool",
            StorageError::Database(_) => "database",
            StorageError::Serialization(_) => "serialization",
            StorageError::Timeout(_) => "timeout",
        }
    }
}

/// Run `f`, tracking in-flight count, duration and failures
pub fn instrument_analysis<T, E, F>(f: F) -> Result<T, E>
where
    E: ErrorLabel,
    F: FnOnce() -> Result<T, E>,
{
    let started = Instant::now();
    gauge!(ACTIVE_ANALYSES).increment(1.0);

    let result = f();

    if let Err(e) = &result {
        counter!(ANALYSIS_ERRORS, "error_type" => e.error_label()).increment(1);
    }
    gauge!(ACTIVE_ANALYSES).decrement(1.0);
    histogram!(ANALYSIS_DURATION).record(started.elapsed().as_secs_f64());

    result
}

pub fn record_query_processing(elapsed: Duration) {
    histogram!(QUERY_PROCESSING_TIME).record(elapsed.as_secs_f64());
}

pub fn record_storage_operation(operation: &'static str) {
    counter!(STORAGE_OPERATIONS, "operation_type" => operation).increment(1);
}

pub fn record_storage_error(error_type: &'static str) {
    counter!(STORAGE_ERRORS, "error_type" => error_type).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Boom;

    impl ErrorLabel for Boom {
        fn error_label(&self) -> &'static str {
            "boom"
        }
    }

    #[test]
    fn test_instrumented_success_passes_through() {
        let result: Result<u32, Boom> = instrument_analysis(|| Ok(7));
        assert!(matches!(result, Ok(7)));
    }

    #[test]
    fn test_instrumented_error_passes_through() {
        let result: Result<u32, Boom> = instrument_analysis(|| Err(Boom));
        assert!(result.is_err());
    }

    #[test]
    fn test_recording_without_recorder_is_harmless() {
        record_query_processing(Duration::from_millis(3));
        record_storage_operation("store_result");
        record_storage_error("pool");
    }
}
