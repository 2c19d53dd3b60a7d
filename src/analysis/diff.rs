//! Schema Diff Engine
//!
//! Compares two validated schema documents and lists every structural change.
//! Tables and columns are visited in the order they first appear in their source
//! document, so the same pair of documents always yields the same list.

use crate::analysis::schema::{Column, SchemaDocument, Table};
use crate::analysis::types::SchemaChange;
use indexmap::IndexMap;
use tracing::debug;

/// The diff engine that compares schema documents
pub struct DiffEngine;

impl DiffEngine {
    /// Compare two schema documents and return all differences
    pub fn generate_diff(old: &SchemaDocument, new: &SchemaDocument) -> Vec<SchemaChange> {
        let mut changes = Vec::new();

        let old_tables = index_tables(&old.tables);
        let new_tables = index_tables(&new.tables);

        // Removed tables
        for name in old_tables.keys().filter(|name| !new_tables.contains_key(*name)) {
            changes.push(SchemaChange::TableRemoved {
                table: name.to_string(),
            });
        }

        // Added tables
        for name in new_tables.keys().filter(|name| !old_tables.contains_key(*name)) {
            changes.push(SchemaChange::TableAdded {
                table: name.to_string(),
            });
        }

        // Tables present on both sides
        for (name, old_table) in &old_tables {
            if let Some(new_table) = new_tables.get(name) {
                Self::diff_columns(name, old_table, new_table, &mut changes);
            }
        }

        debug!(num_changes = changes.len(), "Generated schema differences");
        changes
    }

    fn diff_columns(table: &str, old: &Table, new: &Table, changes: &mut Vec<SchemaChange>) {
        let old_cols = index_columns(&old.columns);
        let new_cols = index_columns(&new.columns);

        for name in old_cols.keys().filter(|name| !new_cols.contains_key(*name)) {
            changes.push(SchemaChange::ColumnRemoved {
                table: table.to_string(),
                column: name.to_string(),
            });
        }

        for (name, col) in new_cols.iter().filter(|(name, _)| !old_cols.contains_key(*name)) {
            changes.push(SchemaChange::ColumnAdded {
                table: table.to_string(),
                column: name.to_string(),
                column_details: (*col).clone(),
            });
        }

        for (name, old_col) in &old_cols {
            let Some(new_col) = new_cols.get(name) else {
                continue;
            };

            if old_col.data_type != new_col.data_type {
                changes.push(SchemaChange::ColumnTypeChanged {
                    table: table.to_string(),
                    column: name.to_string(),
                    old_type: old_col.data_type.clone(),
                    new_type: new_col.data_type.clone(),
                });
            }

            if old_col.nullable != new_col.nullable {
                changes.push(SchemaChange::NullableChanged {
                    table: table.to_string(),
                    column: name.to_string(),
                    old_nullable: old_col.nullable,
                    new_nullable: new_col.nullable,
                });
            }
        }
    }
}

/// Name -> table; a repeated name keeps its first position but the last definition
fn index_tables(tables: &[Table]) -> IndexMap<&str, &Table> {
    tables.iter().map(|t| (t.name.as_str(), t)).collect()
}

fn index_columns(columns: &[Column]) -> IndexMap<&str, &Column> {
    columns.iter().map(|c| (c.name.as_str(), c)).collect()
}
