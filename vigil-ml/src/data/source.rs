//! Tabular batches and the CSV reader/writer used between stages.

use crate::error::{PipelineError, Result};
use crate::persistence::atomic_write;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Cell spellings read as a missing value.
const NULL_TOKENS: &[&str] = &["", "na", "NA", "nan", "NaN", "null", "NULL", "N/A"];

/// A rectangular batch of rows with named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataBatch {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Build a batch, checking column names are unique and every row has
    /// one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(PipelineError::dataset(format!("duplicate column name: {dup}")));
        }
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(PipelineError::dataset(format!(
                "row {idx} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Borrow the cells of column `idx`, in row order.
    pub fn column_at(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |row| row.get(idx))
    }

    /// Borrow the cells of a named column.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        self.column_index(name)
            .map(|idx| self.column_at(idx).collect())
    }
}

/// Anything a stage can load a batch from.
pub trait DataSource {
    /// Load the full batch.
    fn load(&self) -> Result<DataBatch>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: u8,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }
}

impl DataSource for CsvSource {
    fn load(&self) -> Result<DataBatch> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_path(&self.path)?;

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(PipelineError::dataset(format!(
                "CSV file has no header: {}",
                self.path.display()
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(parse_cell).collect());
        }

        let batch = DataBatch::new(columns, rows)?;
        tracing::debug!(
            path = %self.path.display(),
            rows = batch.row_count(),
            columns = batch.column_count(),
            "Read CSV table"
        );
        Ok(batch)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Read a CSV table from `path`.
pub fn read_csv(path: &Path) -> Result<DataBatch> {
    CsvSource::new(path).load()
}

/// Write a batch as CSV (header + rows), replacing any file at `path`.
pub fn write_csv(path: &Path, batch: &DataBatch) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&batch.columns)?;
    for row in &batch.rows {
        writer.write_record(row.iter().map(render_cell))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))?;
    atomic_write(path, &bytes)
}

/// Parse a raw CSV cell into a typed value.
pub fn parse_cell(raw: &str) -> Value {
    let s = raw.trim();
    if NULL_TOKENS.contains(&s) {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = s.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match s {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

/// Render a value as a CSV cell; nulls become empty cells.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
