//! Column-level schema validation.

use crate::data::schema::SchemaDefinition;
use crate::data::source::DataBatch;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How strictly a table's columns are checked against the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaMode {
    /// Same column names, any order, no duplicates.
    #[default]
    Names,
    /// Same number of columns only.
    Count,
}

/// Outcome of checking one table against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCheck {
    pub passed: bool,
    pub table_columns: usize,
    pub schema_columns: usize,
    /// In the schema but not in the table.
    pub missing: Vec<String>,
    /// In the table but not in the schema.
    pub extra: Vec<String>,
}

impl ColumnCheck {
    pub fn passed(&self) -> bool {
        self.passed
    }
}

/// Check `table`'s columns against `schema`.
///
/// `missing` and `extra` are always computed and logged; in
/// [`SchemaMode::Count`] they do not affect the result.
pub fn validate_columns(table: &DataBatch, schema: &SchemaDefinition, mode: SchemaMode) -> ColumnCheck {
    let table_names: HashSet<&str> = table.columns.iter().map(String::as_str).collect();
    let schema_names: HashSet<&str> = schema.names().collect();

    let missing: Vec<String> = schema
        .names()
        .filter(|n| !table_names.contains(n))
        .map(str::to_string)
        .collect();
    let extra: Vec<String> = table
        .columns
        .iter()
        .filter(|n| !schema_names.contains(n.as_str()))
        .cloned()
        .collect();

    let counts_match = table.column_count() == schema.len();
    let passed = match mode {
        SchemaMode::Count => counts_match,
        SchemaMode::Names => counts_match && missing.is_empty() && extra.is_empty(),
    };

    tracing::info!(
        required = schema.len(),
        actual = table.column_count(),
        ?mode,
        passed,
        "Checked table columns against schema"
    );
    if !missing.is_empty() {
        tracing::warn!(columns = ?missing, "Columns missing from table");
    }
    if !extra.is_empty() {
        tracing::warn!(columns = ?extra, "Columns not declared in schema");
    }

    ColumnCheck {
        passed,
        table_columns: table.column_count(),
        schema_columns: schema.len(),
        missing,
        extra,
    }
}

/// The count-only check.
pub fn validate_no_of_columns(table: &DataBatch, schema: &SchemaDefinition) -> bool {
    validate_columns(table, schema, SchemaMode::Count).passed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(cols: &[&str]) -> DataBatch {
        DataBatch::new(cols.iter().map(|c| c.to_string()).collect(), Vec::new()).unwrap()
    }

    #[test]
    fn test_same_names_any_order_pass() {
        let schema = SchemaDefinition::from_names(["a", "b", "c"]);
        let check = validate_columns(&table(&["c", "a", "b"]), &schema, SchemaMode::Names);
        assert!(check.passed());
        assert!(check.missing.is_empty() && check.extra.is_empty());
    }

    #[test]
    fn test_count_mismatch_fails_in_both_modes() {
        let schema = SchemaDefinition::from_names(["a", "b"]);
        let t = table(&["a"]);
        assert!(!validate_columns(&t, &schema, SchemaMode::Names).passed());
        assert!(!validate_no_of_columns(&t, &schema));
    }

    #[test]
    fn test_renamed_column_only_fails_by_name() {
        let schema = SchemaDefinition::from_names(["a", "b"]);
        let t = table(&["a", "z"]);
        let check = validate_columns(&t, &schema, SchemaMode::Names);
        assert!(!check.passed());
        assert_eq!(check.missing, vec!["b".to_string()]);
        assert_eq!(check.extra, vec!["z".to_string()]);

        let lenient = validate_columns(&t, &schema, SchemaMode::Count);
        assert!(lenient.passed());
        assert_eq!(lenient.extra, vec!["z".to_string()]);
    }

    #[test]
    fn test_duplicate_table_column_fails() {
        let schema = SchemaDefinition::from_names(["a", "b"]);
        assert!(!validate_columns(&table(&["a", "b", "b"]), &schema, SchemaMode::Names).passed());
    }
}
