//! Impact analysis
//!
//! Classifies a change list into an aggregate risk assessment. The cut-off points
//! are policy, kept in [`ImpactThresholds`] so they can be tuned from configuration.

use crate::analysis::types::{
    BreakingChange, ImpactAssessment, MigrationComplexity, SchemaChange, Severity,
};
use serde::Deserialize;
use tracing::info;

/// Severity is high once the breaking count exceeds this
pub const BREAKING_SEVERITY_ABOVE: usize = 0;
/// Severity is medium once the complexity count exceeds this
pub const COMPLEXITY_SEVERITY_ABOVE: usize = 0;
/// Migration complexity is high once the complexity count exceeds this
pub const HIGH_COMPLEXITY_ABOVE: usize = 3;
/// Migration complexity is medium once the complexity count exceeds this
pub const MEDIUM_COMPLEXITY_ABOVE: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImpactThresholds {
    pub breaking_severity_above: usize,
    pub complexity_severity_above: usize,
    pub high_complexity_above: usize,
    pub medium_complexity_above: usize,
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            breaking_severity_above: BREAKING_SEVERITY_ABOVE,
            complexity_severity_above: COMPLEXITY_SEVERITY_ABOVE,
            high_complexity_above: HIGH_COMPLEXITY_ABOVE,
            medium_complexity_above: MEDIUM_COMPLEXITY_ABOVE,
        }
    }
}

pub struct ImpactAnalyzer {
    thresholds: ImpactThresholds,
}

impl ImpactAnalyzer {
    pub fn new(thresholds: ImpactThresholds) -> Self {
        Self { thresholds }
    }

    /// Analyze the impact of a list of schema changes
    pub fn analyze_impact(&self, changes: &[SchemaChange]) -> ImpactAssessment {
        let mut breaking_changes = Vec::new();
        let mut data_loss_risk = false;
        let mut complex_changes = 0usize;

        for change in changes {
            let kind = change.kind();

            if kind.is_breaking() {
                breaking_changes.push(BreakingChange {
                    kind,
                    location: change.location(),
                });
            }

            if kind.risks_data_loss() {
                data_loss_risk = true;
            }

            if kind.adds_complexity() {
                complex_changes += 1;
            }
        }

        let severity = self.severity(breaking_changes.len(), complex_changes);
        let migration_complexity = self.complexity(complex_changes);

        info!(
            severity = ?severity,
            breaking_changes = breaking_changes.len(),
            data_loss_risk,
            "Completed impact analysis"
        );

        ImpactAssessment {
            severity,
            breaking_changes,
            data_loss_risk,
            performance_impact: Vec::new(),
            migration_complexity,
        }
    }

    fn severity(&self, breaking: usize, complex: usize) -> Severity {
        if breaking > self.thresholds.breaking_severity_above {
            Severity::High
        } else if complex > self.thresholds.complexity_severity_above {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    fn complexity(&self, complex: usize) -> MigrationComplexity {
        if complex > self.thresholds.high_complexity_above {
            MigrationComplexity::High
        } else if complex > self.thresholds.medium_complexity_above {
            MigrationComplexity::Medium
        } else {
            MigrationComplexity::Low
        }
    }
}

impl Default for ImpactAnalyzer {
    fn default() -> Self {
        Self::new(ImpactThresholds::default())
    }
}
