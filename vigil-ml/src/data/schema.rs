//! Schema definition, YAML loading, and column type inference.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Column data type, as declared in a schema or inferred from values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Null,
    Unknown,
}

impl ColumnType {
    /// Map a pandas-style dtype tag (`int64`, `float64`, `object`, ...).
    pub fn from_dtype(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            t if t.starts_with("int") || t.starts_with("uint") => Self::Integer,
            t if t.starts_with("float") || t == "double" => Self::Float,
            "object" | "str" | "string" | "category" => Self::String,
            "bool" | "boolean" => Self::Boolean,
            _ => Self::Unknown,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// How a column's distribution is compared between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl From<ColumnType> for ColumnKind {
    fn from(dtype: ColumnType) -> Self {
        if dtype.is_numeric() {
            Self::Numeric
        } else {
            Self::Categorical
        }
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: Option<ColumnType>,
}

/// Expected columns of a dataset, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub numerical_columns: Vec<String>,
}

/// On-disk layout: `columns` is a list of `name: dtype` maps or bare names.
#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: Vec<RawColumn>,
    #[serde(default)]
    numerical_columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumn {
    Name(String),
    Typed(BTreeMap<String, String>),
}

impl SchemaDefinition {
    /// Build a schema from bare column names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|name| ColumnSchema {
                    name: name.into(),
                    dtype: None,
                })
                .collect(),
            numerical_columns: Vec::new(),
        }
    }

    /// Load a schema from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read schema {}: {e}", path.display()))
        })?;
        let schema = Self::from_yaml(&content)?;
        tracing::info!(
            path = %path.display(),
            columns = schema.columns.len(),
            "Loaded dataset schema"
        );
        Ok(schema)
    }

    /// Parse a schema from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawSchema = serde_yaml::from_str(content)
            .map_err(|e| PipelineError::config(format!("malformed schema: {e}")))?;

        let mut columns = Vec::with_capacity(raw.columns.len());
        for entry in raw.columns {
            match entry {
                RawColumn::Name(name) => columns.push(ColumnSchema { name, dtype: None }),
                RawColumn::Typed(map) => {
                    if map.len() != 1 {
                        return Err(PipelineError::config(format!(
                            "schema column entries need exactly one `name: dtype` pair, got {}",
                            map.len()
                        )));
                    }
                    for (name, dtype) in map {
                        columns.push(ColumnSchema {
                            name,
                            dtype: Some(ColumnType::from_dtype(&dtype)),
                        });
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(PipelineError::config(format!(
                    "duplicate schema column: {}",
                    col.name
                )));
            }
        }
        for name in &raw.numerical_columns {
            if !seen.contains(name.as_str()) {
                return Err(PipelineError::config(format!(
                    "numerical column {name} is not declared in columns"
                )));
            }
        }

        Ok(Self {
            columns,
            numerical_columns: raw.numerical_columns,
        })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Comparison kind the schema declares for `name`.
    ///
    /// Listing in `numerical_columns` wins over the dtype. Undeclared columns
    /// and unrecognised dtypes give `None`.
    pub fn declared_kind(&self, name: &str) -> Option<ColumnKind> {
        if self.numerical_columns.iter().any(|c| c == name) {
            return Some(ColumnKind::Numeric);
        }
        match self.columns.iter().find(|c| c.name == name)?.dtype? {
            ColumnType::Unknown | ColumnType::Null => None,
            dtype => Some(dtype.into()),
        }
    }
}

/// Infer column type from a sample of values.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a serde_json::Value>,
{
    let mut any = false;
    let mut has_int = false;
    let mut has_float = false;
    let mut has_bool = false;
    let mut has_string = false;

    for v in values {
        match v {
            serde_json::Value::Null => continue,
            serde_json::Value::Number(n) => {
                if n.is_f64() {
                    has_float = true;
                } else {
                    has_int = true;
                }
            }
            serde_json::Value::Bool(_) => has_bool = true,
            serde_json::Value::String(_) => has_string = true,
            _ => has_string = true,
        }
        any = true;
    }

    if !any {
        return ColumnType::Null;
    }
    if has_string || (has_bool && (has_int || has_float)) {
        return ColumnType::String;
    }
    if has_float {
        return ColumnType::Float;
    }
    if has_int {
        return ColumnType::Integer;
    }
    if has_bool {
        return ColumnType::Boolean;
    }
    ColumnType::Unknown
}

/// Inferred comparison kind, or `None` when the column has no non-null values.
pub fn infer_column_kind<'a, I>(values: I) -> Option<ColumnKind>
where
    I: IntoIterator<Item = &'a serde_json::Value>,
{
    match infer_column_type(values) {
        ColumnType::Null => None,
        dtype => Some(dtype.into()),
    }
}
