//! Pipeline configuration and the per-run artifact layout.
//!
//! Uses `figment` for layered configuration: defaults -> TOML file -> environment.
//! Environment keys use the `VIGIL_` prefix and `__` as the nesting separator,
//! e.g. `VIGIL_INGESTION__STORE_URI` or `VIGIL_VALIDATION__DRIFT_THRESHOLD`.

use crate::error::{PipelineError, Result};
use crate::validate::SchemaMode;
use chrono::{DateTime, Local};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File picked up from the working directory when no explicit config is given.
pub const DEFAULT_CONFIG_FILE: &str = "vigil.toml";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub transformation: TransformationConfig,
    #[serde(default)]
    pub trainer: TrainerConfig,
}

/// Settings shared by every stage of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Pipeline name, used in log lines.
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    /// Root folder under which each run gets a timestamped directory.
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,
    /// YAML schema describing the expected columns.
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    /// Overall deadline for one run in seconds (0 disables it).
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            artifact_root: default_artifact_root(),
            schema_path: default_schema_path(),
            timeout_secs: 0,
        }
    }
}

fn default_pipeline_name() -> String {
    "NetworkSecurity".to_string()
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from("Artifacts")
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("data_schema").join("schema.yaml")
}

/// Data ingestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Location of the document store. Passed explicitly to the store constructor.
    #[serde(default = "default_store_uri")]
    pub store_uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Fraction of rows that go to the test split.
    #[serde(default = "default_split_ratio")]
    pub train_test_split_ratio: f64,
    /// Seed for the split shuffle.
    #[serde(default = "default_seed")]
    pub random_seed: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            store_uri: default_store_uri(),
            database: default_database(),
            collection: default_collection(),
            train_test_split_ratio: default_split_ratio(),
            random_seed: default_seed(),
        }
    }
}

fn default_store_uri() -> String {
    "document_store".to_string()
}

fn default_database() -> String {
    "network_security".to_string()
}

fn default_collection() -> String {
    "network_data".to_string()
}

fn default_split_ratio() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

/// Data validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Significance level for numeric columns and distance bound for categorical ones.
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
    #[serde(default)]
    pub schema_mode: SchemaMode,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            drift_threshold: default_drift_threshold(),
            schema_mode: SchemaMode::default(),
        }
    }
}

fn default_drift_threshold() -> f64 {
    0.05
}

/// Data transformation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationConfig {
    #[serde(default = "default_target_column")]
    pub target_column: String,
    /// Neighbours averaged by the KNN imputer.
    #[serde(default = "default_neighbors")]
    pub n_neighbors: usize,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            target_column: default_target_column(),
            n_neighbors: default_neighbors(),
        }
    }
}

fn default_target_column() -> String {
    "Result".to_string()
}

fn default_neighbors() -> usize {
    3
}

/// Model trainer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Minimum test accuracy for the model to be accepted.
    #[serde(default = "default_expected_accuracy")]
    pub expected_accuracy: f64,
    /// Maximum tolerated gap between train and test accuracy before warning.
    #[serde(default = "default_fit_threshold")]
    pub overfitting_underfitting_threshold: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            expected_accuracy: default_expected_accuracy(),
            overfitting_underfitting_threshold: default_fit_threshold(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
        }
    }
}

fn default_expected_accuracy() -> f64 {
    0.6
}

fn default_fit_threshold() -> f64 {
    0.05
}

fn default_epochs() -> usize {
    500
}

fn default_learning_rate() -> f64 {
    0.1
}

/// Load configuration: defaults -> TOML file -> `VIGIL_*` environment.
///
/// An explicit `path` must exist; without one, `vigil.toml` in the working
/// directory is merged when present.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    match path {
        Some(path) if !path.exists() => {
            return Err(PipelineError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.exists() {
                figment = figment.merge(Toml::file(local));
            }
        }
    }

    figment = figment.merge(Env::prefixed("VIGIL_").split("__"));

    let config: PipelineConfig = figment.extract()?;
    config.check()?;
    Ok(config)
}

impl PipelineConfig {
    /// Reject values no stage can work with.
    pub fn check(&self) -> Result<()> {
        let ratio = self.ingestion.train_test_split_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::config(format!(
                "train_test_split_ratio must be in (0, 1), got {ratio}"
            )));
        }
        if !(self.validation.drift_threshold >= 0.0) {
            return Err(PipelineError::config("drift_threshold must be non-negative"));
        }
        if self.transformation.n_neighbors == 0 {
            return Err(PipelineError::config("n_neighbors must be at least 1"));
        }
        if self.transformation.target_column.is_empty() {
            return Err(PipelineError::config("target_column must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Artifact layout
// ---------------------------------------------------------------------------

pub const TRAIN_FILE_NAME: &str = "train.csv";
pub const TEST_FILE_NAME: &str = "test.csv";
pub const FEATURE_STORE_FILE_NAME: &str = "phishing_data.csv";
pub const DRIFT_REPORT_FILE_NAME: &str = "report.yaml";

/// Directory layout of one pipeline run, rooted at `<artifact_root>/<timestamp>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub run_dir: PathBuf,
    pub timestamp: String,
}

/// Output paths of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionPaths {
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
}

/// Output paths of the validation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPaths {
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
}

/// Output paths of the transformation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationPaths {
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub transformed_object_file_path: PathBuf,
}

/// Output paths of the trainer stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerPaths {
    pub trained_model_file_path: PathBuf,
}

impl ArtifactLayout {
    /// Layout for a run started at `started`.
    pub fn new(artifact_root: &Path, started: DateTime<Local>) -> Self {
        let timestamp = started.format("%d_%m_%Y_%H_%M_%S").to_string();
        Self {
            run_dir: artifact_root.join(&timestamp),
            timestamp,
        }
    }

    pub fn ingestion(&self) -> IngestionPaths {
        let dir = self.run_dir.join("data_ingestion");
        IngestionPaths {
            feature_store_file_path: dir.join("feature_store").join(FEATURE_STORE_FILE_NAME),
            training_file_path: dir.join("ingested").join(TRAIN_FILE_NAME),
            testing_file_path: dir.join("ingested").join(TEST_FILE_NAME),
        }
    }

    pub fn validation(&self) -> ValidationPaths {
        let dir = self.run_dir.join("data_validation");
        ValidationPaths {
            valid_train_file_path: dir.join("validated").join(TRAIN_FILE_NAME),
            valid_test_file_path: dir.join("validated").join(TEST_FILE_NAME),
            drift_report_file_path: dir.join("drift_store").join(DRIFT_REPORT_FILE_NAME),
        }
    }

    pub fn transformation(&self) -> TransformationPaths {
        let dir = self.run_dir.join("data_transformation");
        TransformationPaths {
            transformed_train_file_path: dir.join("transformed").join("train.json"),
            transformed_test_file_path: dir.join("transformed").join("test.json"),
            transformed_object_file_path: dir
                .join("transformed_object")
                .join("preprocessing.json"),
        }
    }

    pub fn trainer(&self) -> TrainerPaths {
        TrainerPaths {
            trained_model_file_path: self
                .run_dir
                .join("model_trainer")
                .join("trained_model")
                .join("model.json"),
        }
    }
}
