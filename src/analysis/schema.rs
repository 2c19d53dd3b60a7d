//! Schema document model
//!
//! The structural description of tables and columns that the pipeline compares.
//! Documents are read-only inputs: nothing downstream mutates them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// A complete schema document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub tables: Vec<Table>,
    /// Fields we don't interpret are carried through verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: ColumnType,
    /// `None` means the document did not say, which is distinct from `Some(true)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Outer `None`: no `default` key. `Some(None)`: an explicit `null`.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Option<DefaultValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Dialect-specific type name, compared by exact text only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnType(String);

impl ColumnType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Any present `default` key, `null` included, becomes `Some`
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<DefaultValue>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<DefaultValue>::deserialize(deserializer).map(Some)
}

/// Column default: a string or a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Text(String),
    Number(Number),
}

impl SchemaDocument {
    pub fn table(&self, name: &str) -> Option<&Table> {
        // last definition wins when a name is repeated
        self.tables.iter().rev().find(|t| t.name == name)
    }
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            extra: Map::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: ColumnType::new(data_type),
            nullable: None,
            default: None,
            constraints: None,
            extra: Map::new(),
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }
}
