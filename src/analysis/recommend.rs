//! Migration recommendations derived from a change list and its impact

use crate::analysis::types::{
    ImpactAssessment, Priority, Recommendation, RecommendationKind, SchemaChange, Severity,
};

pub struct RecommendationEngine;

impl RecommendationEngine {
    /// One recommendation per risky change, in change order, then the global ones
    pub fn recommend(changes: &[SchemaChange], impact: &ImpactAssessment) -> Vec<Recommendation> {
        let mut recommendations: Vec<_> = changes.iter().filter_map(Self::for_change).collect();

        if impact.severity == Severity::High {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Testing,
                description: "Conduct thorough testing with production data sample".to_string(),
                priority: Priority::High,
            });
        }

        recommendations
    }

    fn for_change(change: &SchemaChange) -> Option<Recommendation> {
        match change {
            SchemaChange::ColumnRemoved { column, .. } => Some(Recommendation {
                kind: RecommendationKind::DataMigration,
                description: format!("Create data migration plan for removed column: {}", column),
                priority: Priority::High,
            }),
            SchemaChange::ColumnTypeChanged {
                column,
                old_type,
                new_type,
                ..
            } => Some(Recommendation {
                kind: RecommendationKind::DataConversion,
                description: format!(
                    "Plan data conversion from {} to {} for column: {}",
                    old_type, new_type, column
                ),
                priority: Priority::Medium,
            }),
            SchemaChange::TableRemoved { table } => Some(Recommendation {
                kind: RecommendationKind::Backup,
                description: format!("Backup data from table before removal: {}", table),
                priority: Priority::High,
            }),
            _ => None,
        }
    }
}
