//! Allowed-schema registry.
//!
//! The allow-list maps table names to the columns a generated statement may
//! reference. It is read exactly once at process start and shared read-only
//! for the process lifetime; nothing ever re-reads the source.

use crate::error::{Result, WardError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Table name -> permitted column names. Lookups are byte-exact and
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedSchema {
    tables: BTreeMap<String, BTreeSet<String>>,
}

impl AllowedSchema {
    /// Parse a JSON object of table name -> array of column names.
    pub fn from_json(raw: &str) -> Result<Self> {
        let tables: BTreeMap<String, BTreeSet<String>> = serde_json::from_str(raw)
            .map_err(|e| {
                WardError::Config(format!(
                    "allowed schema must map table names to column lists: {}",
                    e
                ))
            })?;
        Ok(Self { tables })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WardError::Config(format!(
                "failed to read allowed schema {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            WardError::Config(message) => {
                WardError::Config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn table_columns(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(table)
    }

    /// True when at least one allowed table carries this column.
    pub fn column_in_any_table(&self, column: &str) -> bool {
        self.tables.values().any(|cols| cols.contains(column))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Loads the allow-list once and hands out shared references forever.
pub struct SchemaRegistry {
    schema: Arc<AllowedSchema>,
}

impl SchemaRegistry {
    /// Performs the one-time read. A missing or malformed source is fatal
    /// at startup.
    pub fn load(path: &Path) -> Result<Self> {
        let schema = AllowedSchema::from_path(path)?;
        Ok(Self {
            schema: Arc::new(schema),
        })
    }

    pub fn from_schema(schema: AllowedSchema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    /// Every caller observes the identical cached value.
    pub fn schema(&self) -> Arc<AllowedSchema> {
        Arc::clone(&self.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AllowedSchema {
        AllowedSchema::from_json(r#"{"person": ["person_id", "name"], "visit": ["visit_id"]}"#)
            .unwrap()
    }

    #[test]
    fn parses_table_column_mapping() {
        let schema = sample();
        assert_eq!(schema.len(), 2);
        assert!(schema.contains_table("person"));
        assert!(!schema.contains_table("ghost"));
        assert!(schema.table_columns("person").unwrap().contains("name"));
    }

    #[test]
    fn table_names_iterate_in_sorted_order() {
        let schema = sample();
        assert!(!schema.is_empty());
        let names: Vec<&str> = schema.table_names().collect();
        assert_eq!(names, vec!["person", "visit"]);
    }

    #[test]
    fn column_lookup_spans_all_tables() {
        let schema = sample();
        assert!(schema.column_in_any_table("visit_id"));
        assert!(!schema.column_in_any_table("password"));
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let schema = sample();
        assert!(!schema.contains_table("Person"));
        assert!(!schema.column_in_any_table("Name"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = AllowedSchema::from_json(r#"{"person": "not-a-list"}"#).unwrap_err();
        assert!(matches!(err, WardError::Config(_)));
    }

    #[test]
    fn registry_hands_out_the_same_schema() {
        let registry = SchemaRegistry::from_schema(sample());
        let a = registry.schema();
        let b = registry.schema();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
