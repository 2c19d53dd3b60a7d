//! Types produced by the analysis pipeline

use crate::analysis::schema::{Column, ColumnType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One structural difference between two schema documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaChange {
    TableAdded {
        table: String,
    },
    TableRemoved {
        table: String,
    },
    ColumnAdded {
        table: String,
        column: String,
        column_details: Column,
    },
    ColumnRemoved {
        table: String,
        column: String,
    },
    ColumnTypeChanged {
        table: String,
        column: String,
        old_type: ColumnType,
        new_type: ColumnType,
    },
    NullableChanged {
        table: String,
        column: String,
        old_nullable: Option<bool>,
        new_nullable: Option<bool>,
    },
}

/// The kind tag of a [`SchemaChange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    TableAdded,
    TableRemoved,
    ColumnAdded,
    ColumnRemoved,
    ColumnTypeChanged,
    NullableChanged,
}

impl ChangeKind {
    pub fn is_breaking(&self) -> bool {
        matches!(
            self,
            ChangeKind::TableRemoved | ChangeKind::ColumnRemoved | ChangeKind::ColumnTypeChanged
        )
    }

    pub fn risks_data_loss(&self) -> bool {
        matches!(self, ChangeKind::TableRemoved | ChangeKind::ColumnRemoved)
    }

    pub fn adds_complexity(&self) -> bool {
        matches!(self, ChangeKind::ColumnTypeChanged | ChangeKind::TableRemoved)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::TableAdded => "table_added",
            ChangeKind::TableRemoved => "table_removed",
            ChangeKind::ColumnAdded => "column_added",
            ChangeKind::ColumnRemoved => "column_removed",
            ChangeKind::ColumnTypeChanged => "column_type_changed",
            ChangeKind::NullableChanged => "nullable_changed",
        };
        f.write_str(name)
    }
}

impl SchemaChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            SchemaChange::TableAdded { .. } => ChangeKind::TableAdded,
            SchemaChange::TableRemoved { .. } => ChangeKind::TableRemoved,
            SchemaChange::ColumnAdded { .. } => ChangeKind::ColumnAdded,
            SchemaChange::ColumnRemoved { .. } => ChangeKind::ColumnRemoved,
            SchemaChange::ColumnTypeChanged { .. } => ChangeKind::ColumnTypeChanged,
            SchemaChange::NullableChanged { .. } => ChangeKind::NullableChanged,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            SchemaChange::TableAdded { table }
            | SchemaChange::TableRemoved { table }
            | SchemaChange::ColumnAdded { table, .. }
            | SchemaChange::ColumnRemoved { table, .. }
            | SchemaChange::ColumnTypeChanged { table, .. }
            | SchemaChange::NullableChanged { table, .. } => table,
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            SchemaChange::TableAdded { .. } | SchemaChange::TableRemoved { .. } => None,
            SchemaChange::ColumnAdded { column, .. }
            | SchemaChange::ColumnRemoved { column, .. }
            | SchemaChange::ColumnTypeChanged { column, .. }
            | SchemaChange::NullableChanged { column, .. } => Some(column),
        }
    }

    /// `table.column`, with an empty column part for table-level changes
    pub fn location(&self) -> String {
        format!("{}.{}", self.table(), self.column().unwrap_or_default())
    }
}

/// Overall severity of a change set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// How much work the migration is expected to take
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationComplexity {
    Low,
    Medium,
    High,
}

/// Reference to a change that can break existing consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub location: String,
}

/// Aggregate risk assessment of a change list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub severity: Severity,
    pub breaking_changes: Vec<BreakingChange>,
    pub data_loss_risk: bool,
    /// Reserved; nothing populates it yet
    pub performance_impact: Vec<String>,
    pub migration_complexity: MigrationComplexity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    DataMigration,
    DataConversion,
    Backup,
    Testing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

/// A suggested action before applying the migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub description: String,
    pub priority: Priority,
}

/// Verdict for one query checked against the target schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryValidationResult {
    pub query: String,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// The full output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<SchemaChange>,
    pub impact: ImpactAssessment,
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_validation: Option<Vec<QueryValidationResult>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_serializes_with_type_tag() {
        let change = SchemaChange::ColumnTypeChanged {
            table: "users".to_string(),
            column: "age".to_string(),
            old_type: "INTEGER".into(),
            new_type: "TEXT".into(),
        };

        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({
                "type": "column_type_changed",
                "table": "users",
                "column": "age",
                "old_type": "INTEGER",
                "new_type": "TEXT"
            })
        );
    }

    #[test]
    fn test_unspecified_nullable_serializes_as_null() {
        let change = SchemaChange::NullableChanged {
            table: "t".to_string(),
            column: "c".to_string(),
            old_nullable: None,
            new_nullable: Some(true),
        };
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["old_nullable"], json!(null));
        assert_eq!(value["new_nullable"], json!(true));
    }

    #[test]
    fn test_location_for_table_level_change() {
        let change = SchemaChange::TableRemoved { table: "orders".to_string() };
        assert_eq!(change.location(), "orders.");
        assert_eq!(change.kind().to_string(), "table_removed");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }
}
