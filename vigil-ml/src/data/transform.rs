//! Feature extraction and KNN imputation of missing values.

use crate::data::source::DataBatch;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric feature rows; `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl FeatureMatrix {
    pub fn missing_count(&self) -> usize {
        self.rows.iter().flatten().filter(|c| c.is_none()).count()
    }
}

/// A fully numeric dataset as persisted after transformation.
///
/// Each row holds the features followed by the target as its last element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedDataset {
    pub feature_names: Vec<String>,
    pub target_column: String,
    pub rows: Vec<Vec<f64>>,
}

impl TransformedDataset {
    pub fn new(
        feature_names: Vec<String>,
        target_column: impl Into<String>,
        features: Vec<Vec<f64>>,
        target: &[f64],
    ) -> Self {
        let rows = features
            .into_iter()
            .zip(target)
            .map(|(mut row, y)| {
                row.push(*y);
                row
            })
            .collect();
        Self {
            feature_names,
            target_column: target_column.into(),
            rows,
        }
    }

    /// Features and target as separate views.
    pub fn split(&self) -> (Vec<Vec<f64>>, Vec<f64>) {
        self.rows
            .iter()
            .filter_map(|row| row.split_last())
            .map(|(y, x)| (x.to_vec(), *y))
            .unzip()
    }
}

/// Split a batch into numeric features and a binary target.
///
/// The target column is removed from the features and `-1` labels become `0`.
pub fn split_features_target(batch: &DataBatch, target: &str) -> Result<(FeatureMatrix, Vec<f64>)> {
    let target_idx = batch
        .column_index(target)
        .ok_or_else(|| PipelineError::dataset(format!("target column {target} not found")))?;

    let feature_names: Vec<String> = batch
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target_idx)
        .map(|(_, c)| c.clone())
        .collect();

    let mut rows = Vec::with_capacity(batch.row_count());
    let mut labels = Vec::with_capacity(batch.row_count());
    for (row_idx, row) in batch.rows.iter().enumerate() {
        let label = row[target_idx].as_f64().ok_or_else(|| {
            PipelineError::dataset(format!("row {row_idx}: target {target} is not numeric"))
        })?;
        labels.push(if label == -1.0 { 0.0 } else { label });

        let mut features = Vec::with_capacity(feature_names.len());
        for (col_idx, cell) in row.iter().enumerate() {
            if col_idx == target_idx {
                continue;
            }
            features.push(match cell {
                Value::Null => None,
                Value::Number(n) => n.as_f64(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                other => {
                    return Err(PipelineError::dataset(format!(
                        "row {row_idx}: feature {} has non-numeric value {other}",
                        batch.columns[col_idx]
                    )));
                }
            });
        }
        rows.push(features);
    }

    Ok((
        FeatureMatrix {
            feature_names,
            rows,
        },
        labels,
    ))
}

/// Imputes each missing cell with the uniform mean of that feature over the
/// `n_neighbors` nearest training rows that observe it.
///
/// Distances are NaN-euclidean: squared differences over the coordinates
/// both rows observe, scaled by `features / observed` before the square root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnImputer {
    pub n_neighbors: usize,
    pub feature_names: Vec<String>,
    /// Fitted donor rows.
    pub donors: Vec<Vec<Option<f64>>>,
    /// Per-feature training mean, used when no donor observes a feature.
    pub column_means: Vec<f64>,
}

impl KnnImputer {
    pub fn fit(features: &FeatureMatrix, n_neighbors: usize) -> Result<Self> {
        if n_neighbors == 0 {
            return Err(PipelineError::config("n_neighbors must be at least 1"));
        }
        let width = features.feature_names.len();
        let mut column_means = Vec::with_capacity(width);
        for (j, name) in features.feature_names.iter().enumerate() {
            let observed: Vec<f64> = features.rows.iter().filter_map(|r| r[j]).collect();
            if observed.is_empty() {
                return Err(PipelineError::dataset(format!(
                    "feature {name} has no observed values to impute from"
                )));
            }
            column_means.push(observed.iter().sum::<f64>() / observed.len() as f64);
        }
        Ok(Self {
            n_neighbors,
            feature_names: features.feature_names.clone(),
            donors: features.rows.clone(),
            column_means,
        })
    }

    /// Fill every missing cell. Observed cells are left untouched.
    pub fn transform(&self, features: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        if features.feature_names != self.feature_names {
            return Err(PipelineError::dataset(
                "feature columns differ from those the imputer was fitted on",
            ));
        }
        Ok(features.rows.iter().map(|row| self.impute_row(row)).collect())
    }

    fn impute_row(&self, row: &[Option<f64>]) -> Vec<f64> {
        if row.iter().all(Option::is_some) {
            return row.iter().flatten().copied().collect();
        }

        let mut by_distance: Vec<(f64, usize)> = self
            .donors
            .iter()
            .enumerate()
            .filter_map(|(i, donor)| nan_euclidean(row, donor).map(|d| (d, i)))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        row.iter()
            .enumerate()
            .map(|(j, cell)| match cell {
                Some(v) => *v,
                None => {
                    let values: Vec<f64> = by_distance
                        .iter()
                        .filter_map(|&(_, i)| self.donors[i][j])
                        .take(self.n_neighbors)
                        .collect();
                    if values.is_empty() {
                        self.column_means[j]
                    } else {
                        values.iter().sum::<f64>() / values.len() as f64
                    }
                }
            })
            .collect()
    }
}

/// `None` when the rows share no observed coordinate.
fn nan_euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut present = 0usize;
    for (x, y) in a.iter().zip(b) {
        if let (Some(x), Some(y)) = (x, y) {
            sum += (x - y).powi(2);
            present += 1;
        }
    }
    if present == 0 {
        return None;
    }
    Some((sum * a.len() as f64 / present as f64).sqrt())
}
