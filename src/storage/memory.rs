//! In-process result store
//!
//! Bounded: once `capacity` sessions are held, storing a new session drops the
//! oldest one. Metrics records are capped the same way.

use super::{MetricsRecord, StorageBackend, StorageError};
use crate::analysis::types::AnalysisReport;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::debug;

/// Reports and metrics held in memory; lost on restart
pub struct MemoryStorage {
    capacity: usize,
    /// Session id -> latest report, oldest session first
    results: RwLock<IndexMap<String, AnalysisReport>>,
    metrics: RwLock<VecDeque<MetricsRecord>>,
}

impl MemoryStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            results: RwLock::new(IndexMap::new()),
            metrics: RwLock::new(VecDeque::new()),
        }
    }

    #[cfg(test)]
    pub async fn recorded_metrics(&self) -> Vec<MetricsRecord> {
        self.metrics.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn store_result(&self, session_id: &str, report: &AnalysisReport) -> Result<(), StorageError> {
        let mut results = self.results.write().await;

        if !results.contains_key(session_id) && results.len() >= self.capacity {
            if let Some((evicted, _)) = results.shift_remove_index(0) {
                debug!(session_id = %evicted, "Evicted oldest analysis result");
            }
        }
        // replacing an existing session keeps its original position
        results.insert(session_id.to_string(), report.clone());

        debug!(session_id, "Stored analysis result in memory");
        Ok(())
    }

    async fn retrieve_result(&self, session_id: &str) -> Result<Option<AnalysisReport>, StorageError> {
        Ok(self.results.read().await.get(session_id).cloned())
    }

    async fn store_metrics(&self, record: &MetricsRecord) -> Result<(), StorageError> {
        let mut metrics = self.metrics.write().await;
        if metrics.len() >= self.capacity {
            metrics.pop_front();
        }
        metrics.push_back(record.clone());
        Ok(())
    }
}
