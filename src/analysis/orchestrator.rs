//! Analysis orchestrator
//!
//! Runs the pipeline end to end: validate both schemas, diff them, assess impact,
//! check queries when there are any, and derive recommendations. A shape error on
//! either schema stops the run before any report exists.

use crate::analysis::diff::DiffEngine;
use crate::analysis::impact::{ImpactAnalyzer, ImpactThresholds};
use crate::analysis::query::QueryValidator;
use crate::analysis::recommend::RecommendationEngine;
use crate::analysis::types::AnalysisReport;
use crate::analysis::validator::{SchemaShapeError, SchemaValidator};
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Called with the elapsed time of every validated query
pub type QueryTimer = fn(Duration);

pub struct SchemaAnalyzer {
    impact: ImpactAnalyzer,
    query_timer: Option<QueryTimer>,
}

impl SchemaAnalyzer {
    pub fn new(thresholds: ImpactThresholds) -> Self {
        Self {
            impact: ImpactAnalyzer::new(thresholds),
            query_timer: None,
        }
    }

    pub fn with_query_timer(mut self, timer: QueryTimer) -> Self {
        self.query_timer = Some(timer);
        self
    }

    /// Analyze the changes between two raw schema documents
    pub fn analyze(
        &self,
        old_schema: &Value,
        new_schema: &Value,
        queries: Option<&[String]>,
    ) -> Result<AnalysisReport, SchemaShapeError> {
        info!(
            old_schema_tables = table_count(old_schema),
            new_schema_tables = table_count(new_schema),
            "Starting schema analysis"
        );

        let old = SchemaValidator::parse(old_schema)?;
        let new = SchemaValidator::parse(new_schema)?;

        let changes = DiffEngine::generate_diff(&old, &new);
        let impact = self.impact.analyze_impact(&changes);

        let query_validation = queries
            .filter(|q| !q.is_empty())
            .map(|q| match self.query_timer {
                Some(timer) => QueryValidator::validate_queries_timed(q, &new, timer),
                None => QueryValidator::validate_queries(q, &new),
            });

        let recommendations = RecommendationEngine::recommend(&changes, &impact);

        info!(
            num_changes = changes.len(),
            impact_level = ?impact.severity,
            "Schema analysis completed"
        );

        Ok(AnalysisReport {
            timestamp: Utc::now(),
            changes,
            impact,
            recommendations,
            query_validation,
        })
    }
}

impl Default for SchemaAnalyzer {
    fn default() -> Self {
        Self::new(ImpactThresholds::default())
    }
}

fn table_count(schema: &Value) -> usize {
    schema
        .get("tables")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}
