//! # vigil-ml: batch training pipeline with a data validation gate
//!
//! Stages run in order inside one timestamped artifact directory:
//!
//! 1. **Ingestion** exports a document collection to a feature-store CSV
//!    and a seeded train/test split.
//! 2. **Validation** checks both tables against the schema, measures
//!    per-column drift between them and writes a drift report.
//! 3. **Transformation** imputes missing features with a KNN imputer.
//! 4. **Training** fits a logistic regression and gates on test accuracy.
//!
//! A table that fails the schema check leaves the validated paths unset on
//! the [`DataValidationArtifact`], and every later stage refuses to run.

pub mod artifact;
pub mod cancel;
pub mod config;
pub mod data;
pub mod error;
pub mod persistence;
pub mod pipeline;
pub mod training;
pub mod validate;

pub use artifact::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact, ModelTrainerArtifact,
};
pub use cancel::CancellationToken;
pub use config::{ArtifactLayout, PipelineConfig, load_config};
pub use error::{PipelineError, Result, StageContext};
pub use pipeline::{DataValidation, PipelineOutcome, TrainingPipeline};
pub use validate::{DriftDetector, DriftOutcome, DriftReport};
