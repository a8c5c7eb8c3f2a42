//! Immutable records of what each stage produced, handed to the next stage.

use crate::config::ValidationPaths;
use crate::error::{PipelineError, Result};
use crate::training::metrics::ClassificationMetrics;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub feature_store_file_path: PathBuf,
    pub trained_file_path: PathBuf,
    pub test_file_path: PathBuf,
    pub feature_store_sha256: String,
    pub row_count: usize,
}

impl DataIngestionArtifact {
    /// Artifact for train/test files produced outside the ingestion stage.
    pub fn from_files(train: impl Into<PathBuf>, test: impl Into<PathBuf>) -> Self {
        Self {
            feature_store_file_path: PathBuf::new(),
            trained_file_path: train.into(),
            test_file_path: test.into(),
            feature_store_sha256: String::new(),
            row_count: 0,
        }
    }
}

/// Output of the validation stage.
///
/// Exactly one family of paths is set: `valid_*` when both tables passed the
/// schema check (whatever the drift outcome), `invalid_*` for the tables that
/// failed it. An unset valid path is how rejection reaches downstream stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    pub validation_status: bool,
    pub valid_train_file_path: Option<PathBuf>,
    pub valid_test_file_path: Option<PathBuf>,
    pub invalid_train_file_path: Option<PathBuf>,
    pub invalid_test_file_path: Option<PathBuf>,
    pub drift_report_file_path: PathBuf,
}

impl DataValidationArtifact {
    /// Both tables passed the schema check and were persisted to the valid paths.
    pub fn accepted(drift_status: bool, paths: &ValidationPaths) -> Self {
        Self {
            validation_status: drift_status,
            valid_train_file_path: Some(paths.valid_train_file_path.clone()),
            valid_test_file_path: Some(paths.valid_test_file_path.clone()),
            invalid_train_file_path: None,
            invalid_test_file_path: None,
            drift_report_file_path: paths.drift_report_file_path.clone(),
        }
    }

    /// At least one table failed the schema check; each failing table's source is recorded.
    pub fn rejected(
        failed_train: Option<PathBuf>,
        failed_test: Option<PathBuf>,
        drift_report_file_path: PathBuf,
    ) -> Self {
        Self {
            validation_status: false,
            valid_train_file_path: None,
            valid_test_file_path: None,
            invalid_train_file_path: failed_train,
            invalid_test_file_path: failed_test,
            drift_report_file_path,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.valid_train_file_path.is_none() || self.valid_test_file_path.is_none()
    }

    /// The validated train and test paths, or `ValidationRejected` if unset.
    pub fn valid_paths(&self) -> Result<(&Path, &Path)> {
        match (&self.valid_train_file_path, &self.valid_test_file_path) {
            (Some(train), Some(test)) => Ok((train.as_path(), test.as_path())),
            _ => {
                let failed: Vec<String> = [&self.invalid_train_file_path, &self.invalid_test_file_path]
                    .into_iter()
                    .flatten()
                    .map(|p| p.display().to_string())
                    .collect();
                Err(PipelineError::rejected(format!(
                    "no validated dataset; schema check failed for {}",
                    if failed.is_empty() {
                        "unknown tables".to_string()
                    } else {
                        failed.join(", ")
                    }
                )))
            }
        }
    }
}

/// Output of the transformation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
}

/// Output of the trainer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub trained_model_file_path: PathBuf,
    pub train_metrics: ClassificationMetrics,
    pub test_metrics: ClassificationMetrics,
    /// `|train accuracy - test accuracy|`.
    pub overfitting_gap: f64,
}
