//! Schema shape validation
//!
//! Checks that a raw document has the structure the diff engine expects before it
//! is turned into a [`SchemaDocument`]. The check is open: fields it does not know
//! about are left alone.

use crate::analysis::schema::SchemaDocument;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error};

/// A schema document that does not have the required shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Schema validation failed at {path}: {message}")]
pub struct SchemaShapeError {
    /// JSON path of the offending value, e.g. `tables[0].columns[2].type`
    pub path: String,
    pub message: String,
}

impl SchemaShapeError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate the shape of a raw schema document
    pub fn validate(schema: &Value) -> Result<(), SchemaShapeError> {
        match Self::check_document(schema) {
            Ok(()) => {
                debug!("Schema validation successful");
                Ok(())
            }
            Err(e) => {
                error!(path = %e.path, error = %e.message, "Schema validation failed");
                Err(e)
            }
        }
    }

    /// Validate and then materialize the typed document
    pub fn parse(schema: &Value) -> Result<SchemaDocument, SchemaShapeError> {
        Self::validate(schema)?;
        serde_json::from_value(schema.clone())
            .map_err(|e| SchemaShapeError::new("$", format!("could not read document: {}", e)))
    }

    fn check_document(schema: &Value) -> Result<(), SchemaShapeError> {
        let root = expect_object(schema, "$")?;
        let tables = root
            .get("tables")
            .ok_or_else(|| SchemaShapeError::new("$", "missing required field 'tables'"))?;
        let tables = expect_array(tables, "tables")?;

        for (i, table) in tables.iter().enumerate() {
            Self::check_table(table, &format!("tables[{}]", i))?;
        }
        Ok(())
    }

    fn check_table(table: &Value, path: &str) -> Result<(), SchemaShapeError> {
        let table = expect_object(table, path)?;
        required_string(table, "name", path)?;

        let columns = table.get("columns").ok_or_else(|| {
            SchemaShapeError::new(path, "missing required field 'columns'")
        })?;
        let columns = expect_array(columns, &format!("{}.columns", path))?;

        for (i, column) in columns.iter().enumerate() {
            Self::check_column(column, &format!("{}.columns[{}]", path, i))?;
        }
        Ok(())
    }

    fn check_column(column: &Value, path: &str) -> Result<(), SchemaShapeError> {
        let column = expect_object(column, path)?;
        required_string(column, "name", path)?;
        required_string(column, "type", path)?;

        if let Some(nullable) = column.get("nullable") {
            if !nullable.is_boolean() {
                return Err(SchemaShapeError::new(
                    format!("{}.nullable", path),
                    format!("expected boolean, found {}", kind_of(nullable)),
                ));
            }
        }

        if let Some(default) = column.get("default") {
            if !(default.is_string() || default.is_number() || default.is_null()) {
                return Err(SchemaShapeError::new(
                    format!("{}.default", path),
                    format!("expected string, number or null, found {}", kind_of(default)),
                ));
            }
        }

        if let Some(constraints) = column.get("constraints") {
            let constraints_path = format!("{}.constraints", path);
            for (i, constraint) in expect_array(constraints, &constraints_path)?.iter().enumerate() {
                if !constraint.is_string() {
                    return Err(SchemaShapeError::new(
                        format!("{}[{}]", constraints_path, i),
                        format!("expected string, found {}", kind_of(constraint)),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, SchemaShapeError> {
    value.as_object().ok_or_else(|| {
        SchemaShapeError::new(path, format!("expected object, found {}", kind_of(value)))
    })
}

fn expect_array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, SchemaShapeError> {
    value.as_array().ok_or_else(|| {
        SchemaShapeError::new(path, format!("expected array, found {}", kind_of(value)))
    })
}

fn required_string(object: &Map<String, Value>, field: &str, path: &str) -> Result<(), SchemaShapeError> {
    match object.get(field) {
        None => Err(SchemaShapeError::new(
            path,
            format!("missing required field '{}'", field),
        )),
        Some(Value::String(_)) => Ok(()),
        Some(other) => Err(SchemaShapeError::new(
            format!("{}.{}", path, field),
            format!("expected string, found {}", kind_of(other)),
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_schema() -> Value {
        json!({
            "tables": [{
                "name": "users",
                "columns": [
                    {"name": "id", "type": "INTEGER", "nullable": false, "constraints": ["PRIMARY KEY"]},
                    {"name": "email", "type": "TEXT", "default": null},
                    {"name": "score", "type": "NUMERIC(10,2)", "default": 0.5}
                ]
            }]
        })
    }

    #[test]
    fn test_valid_schema_passes() {
        assert!(SchemaValidator::validate(&valid_schema()).is_ok());
    }

    #[test]
    fn test_empty_table_list_is_valid() {
        assert!(SchemaValidator::validate(&json!({"tables": []})).is_ok());
    }

    #[test]
    fn test_missing_tables_rejected() {
        let err = SchemaValidator::validate(&json!({"name": "db"})).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(err.message.contains("tables"));
    }

    #[test]
    fn test_non_object_root_rejected() {
        let err = SchemaValidator::validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.message, "expected object, found array");
    }

    #[test]
    fn test_column_type_must_be_string() {
        let err = SchemaValidator::validate(&json!({
            "tables": [{"name": "t", "columns": [{"name": "c", "type": 5}]}]
        }))
        .unwrap_err();
        assert_eq!(err.path, "tables[0].columns[0].type");
    }

    #[test]
    fn test_missing_columns_rejected() {
        let err = SchemaValidator::validate(&json!({"tables": [{"name": "t"}]})).unwrap_err();
        assert_eq!(err.path, "tables[0]");
        assert!(err.message.contains("columns"));
    }

    #[test]
    fn test_nullable_must_be_boolean() {
        let err = SchemaValidator::validate(&json!({
            "tables": [{"name": "t", "columns": [{"name": "c", "type": "TEXT", "nullable": "yes"}]}]
        }))
        .unwrap_err();
        assert_eq!(err.path, "tables[0].columns[0].nullable");
    }

    #[test]
    fn test_boolean_default_rejected() {
        let err = SchemaValidator::validate(&json!({
            "tables": [{"name": "t", "columns": [{"name": "c", "type": "BOOL", "default": true}]}]
        }))
        .unwrap_err();
        assert_eq!(err.path, "tables[0].columns[0].default");
    }

    #[test]
    fn test_constraints_must_be_strings() {
        let err = SchemaValidator::validate(&json!({
            "tables": [{"name": "t", "columns": [{"name": "c", "type": "TEXT", "constraints": ["UNIQUE", 1]}]}]
        }))
        .unwrap_err();
        assert_eq!(err.path, "tables[0].columns[0].constraints[1]");
    }

    #[test]
    fn test_unknown_fields_permitted() {
        let schema = json!({
            "dialect": "postgres",
            "tables": [{"name": "t", "owner": "app", "columns": [{"name": "c", "type": "TEXT", "comment": "x"}]}]
        });
        let doc = SchemaValidator::parse(&schema).unwrap();
        assert_eq!(doc.extra.get("dialect"), Some(&json!("postgres")));
    }

    #[test]
    fn test_error_message_names_path() {
        let err = SchemaValidator::validate(&json!({"tables": "nope"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema validation failed at tables: expected array, found string"
        );
    }
}
