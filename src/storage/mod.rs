//! Result storage
//!
//! Analysis reports are kept per session id, and every successful run leaves a
//! metrics record behind. Two backends exist: an in-process map for single
//! instances and tests, and PostgreSQL for anything that has to survive a restart.

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

use crate::analysis::types::{AnalysisReport, Severity};
use crate::config::{StorageConfig, StorageKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create connection pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Per-run summary persisted alongside the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub duration_ms: u64,
    pub num_changes: usize,
    pub severity: Severity,
    pub num_queries: usize,
    pub num_invalid_queries: usize,
}

impl MetricsRecord {
    pub fn from_report(session_id: &str, report: &AnalysisReport, duration_ms: u64) -> Self {
        let (num_queries, num_invalid_queries) = report
            .query_validation
            .as_deref()
            .map_or((0, 0), |results| {
                (results.len(), results.iter().filter(|r| !r.is_valid).count())
            });

        Self {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            duration_ms,
            num_changes: report.changes.len(),
            severity: report.impact.severity,
            num_queries,
            num_invalid_queries,
        }
    }
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a report under `session_id`, replacing any earlier one
    async fn store_result(&self, session_id: &str, report: &AnalysisReport) -> Result<(), StorageError>;

    async fn retrieve_result(&self, session_id: &str) -> Result<Option<AnalysisReport>, StorageError>;

    async fn store_metrics(&self, record: &MetricsRecord) -> Result<(), StorageError>;
}

/// Run a storage call, giving up after `budget`
pub async fn with_deadline<T, F>(budget: Duration, operation: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::time::timeout(budget, operation)
        .await
        .map_err(|_| StorageError::Timeout(budget))?
}

/// Build the configured backend
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    match config.kind {
        StorageKind::Memory => {
            info!(capacity = config.memory_capacity, "Using in-memory result storage");
            Ok(Arc::new(MemoryStorage::new(config.memory_capacity)))
        }
        StorageKind::Postgresql => {
            let storage = PostgresStorage::connect(&config.database).await?;
            Ok(Arc::new(storage))
        }
    }
}
