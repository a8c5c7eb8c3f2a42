//! Pipeline stages and the driver that chains them within one run directory.

pub mod ingestion;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use ingestion::{DataIngestion, push_csv};
pub use trainer::{ModelTrainer, TrainedModel};
pub use transformation::DataTransformation;
pub use validation::DataValidation;

use crate::artifact::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact, ModelTrainerArtifact,
};
use crate::cancel::CancellationToken;
use crate::config::{ArtifactLayout, PipelineConfig};
use crate::data::schema::SchemaDefinition;
use crate::data::store::DocumentStore;
use crate::error::{Result, StageContext};
use serde::Serialize;

pub const INGESTION_STAGE: &str = "data_ingestion";
pub const VALIDATION_STAGE: &str = "data_validation";
pub const TRANSFORMATION_STAGE: &str = "data_transformation";
pub const TRAINER_STAGE: &str = "model_trainer";

/// Artifacts of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_dir: std::path::PathBuf,
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub transformation: DataTransformationArtifact,
    pub trainer: ModelTrainerArtifact,
}

pub struct TrainingPipeline<'a, S: DocumentStore + ?Sized> {
    config: PipelineConfig,
    layout: ArtifactLayout,
    store: &'a S,
    cancel: CancellationToken,
}

impl<'a, S: DocumentStore + ?Sized> TrainingPipeline<'a, S> {
    pub fn new(config: PipelineConfig, layout: ArtifactLayout, store: &'a S) -> Self {
        Self {
            config,
            layout,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Share `token` with every stage; once it fires the run stops at the
    /// next write with `Cancelled`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Run every stage in order. A rejected validation stops the run before
    /// transformation with `ValidationRejected`.
    pub fn run(&self) -> Result<PipelineOutcome> {
        tracing::info!(
            pipeline = %self.config.pipeline.name,
            run_dir = %self.layout.run_dir.display(),
            "Starting training pipeline"
        );

        let ingestion = DataIngestion::new(
            self.config.ingestion.clone(),
            self.layout.ingestion(),
            self.store,
        )
        .with_cancellation(self.cancel.clone())
        .run()
        .stage(INGESTION_STAGE)?;

        let validation = self.validate(&ingestion)?;
        validation.valid_paths().stage(VALIDATION_STAGE)?;
        if !validation.validation_status {
            tracing::warn!(
                report = %validation.drift_report_file_path.display(),
                "Drift detected between train and test; continuing"
            );
        }

        let transformation = DataTransformation::new(
            self.config.transformation.clone(),
            self.layout.transformation(),
        )
        .with_cancellation(self.cancel.clone())
        .run(&validation)
        .stage(TRANSFORMATION_STAGE)?;

        let trainer = ModelTrainer::new(self.config.trainer.clone(), self.layout.trainer())
            .with_cancellation(self.cancel.clone())
            .run(&transformation)
            .stage(TRAINER_STAGE)?;

        tracing::info!(
            test_accuracy = trainer.test_metrics.accuracy,
            model = %trainer.trained_model_file_path.display(),
            "Training pipeline finished"
        );
        Ok(PipelineOutcome {
            run_dir: self.layout.run_dir.clone(),
            ingestion,
            validation,
            transformation,
            trainer,
        })
    }

    /// Only the validation stage, against an existing ingestion artifact.
    pub fn validate(&self, ingestion: &DataIngestionArtifact) -> Result<DataValidationArtifact> {
        let schema = SchemaDefinition::load(&self.config.pipeline.schema_path).stage(VALIDATION_STAGE)?;
        DataValidation::new(self.config.validation.clone(), schema, self.layout.validation())
            .with_cancellation(self.cancel.clone())
            .run(ingestion)
            .stage(VALIDATION_STAGE)
    }
}
