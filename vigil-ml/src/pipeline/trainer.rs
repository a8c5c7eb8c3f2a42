//! Fit the classifier, score it on both splits and gate on accuracy.

use crate::artifact::{DataTransformationArtifact, ModelTrainerArtifact};
use crate::cancel::{CancellationToken, checkpoint};
use crate::config::{TrainerConfig, TrainerPaths};
use crate::data::transform::TransformedDataset;
use crate::error::{PipelineError, Result};
use crate::persistence::{atomic_write_json, load_json};
use crate::training::{ClassificationMetrics, LogisticRegression};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What gets written to the trained model path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Fitted imputer to apply to raw features before `model`.
    pub preprocessor_file_path: PathBuf,
    pub model: LogisticRegression,
}

pub struct ModelTrainer {
    config: TrainerConfig,
    paths: TrainerPaths,
    cancel: CancellationToken,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig, paths: TrainerPaths) -> Self {
        Self {
            config,
            paths,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run(&self, transformation: &DataTransformationArtifact) -> Result<ModelTrainerArtifact> {
        let train: TransformedDataset = load_json(&transformation.transformed_train_file_path)?;
        let test: TransformedDataset = load_json(&transformation.transformed_test_file_path)?;
        if train.feature_names != test.feature_names {
            return Err(PipelineError::training(
                "train and test matrices have different features",
            ));
        }
        let (train_x, train_y) = train.split();
        let (test_x, test_y) = test.split();

        let (model, history) = LogisticRegression::fit(
            train.feature_names.clone(),
            &train_x,
            &train_y,
            self.config.epochs,
            self.config.learning_rate,
        )?;

        let train_metrics = ClassificationMetrics::from_predictions(&train_y, &model.predict(&train_x));
        let test_metrics = ClassificationMetrics::from_predictions(&test_y, &model.predict(&test_x));
        let overfitting_gap = (train_metrics.accuracy - test_metrics.accuracy).abs();
        tracing::info!(
            train_accuracy = train_metrics.accuracy,
            test_accuracy = test_metrics.accuracy,
            test_f1 = test_metrics.f1_score,
            final_loss = ?history.final_loss(),
            "Evaluated model"
        );

        if test_metrics.accuracy < self.config.expected_accuracy {
            return Err(PipelineError::training(format!(
                "test accuracy {:.4} is below expected {:.4}",
                test_metrics.accuracy, self.config.expected_accuracy
            )));
        }
        if overfitting_gap > self.config.overfitting_underfitting_threshold {
            tracing::warn!(
                gap = overfitting_gap,
                threshold = self.config.overfitting_underfitting_threshold,
                "Train/test accuracy gap exceeds threshold"
            );
        }

        let trained = TrainedModel {
            preprocessor_file_path: transformation.transformed_object_file_path.clone(),
            model,
        };
        checkpoint(&self.cancel, "trained model")?;
        atomic_write_json(&self.paths.trained_model_file_path, &trained)?;

        Ok(ModelTrainerArtifact {
            trained_model_file_path: self.paths.trained_model_file_path.clone(),
            train_metrics,
            test_metrics,
            overfitting_gap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn dataset(labels: impl Fn(usize) -> f64) -> TransformedDataset {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let target: Vec<f64> = (0..20).map(labels).collect();
        TransformedDataset::new(vec!["x".into()], "Result", features, &target)
    }

    fn artifact(root: &Path, train: &TransformedDataset, test: &TransformedDataset) -> DataTransformationArtifact {
        let a = DataTransformationArtifact {
            transformed_object_file_path: root.join("preprocessing.json"),
            transformed_train_file_path: root.join("train.json"),
            transformed_test_file_path: root.join("test.json"),
        };
        atomic_write_json(&a.transformed_train_file_path, train).unwrap();
        atomic_write_json(&a.transformed_test_file_path, test).unwrap();
        a
    }

    fn paths(root: &Path) -> TrainerPaths {
        TrainerPaths {
            trained_model_file_path: root.join("model/model.json"),
        }
    }

    #[test]
    fn test_trains_and_persists_model() {
        let dir = tempfile::tempdir().unwrap();
        let data = dataset(|i| if i >= 10 { 1.0 } else { 0.0 });
        let input = artifact(dir.path(), &data, &data);

        let out = ModelTrainer::new(TrainerConfig::default(), paths(dir.path()))
            .run(&input)
            .unwrap();
        assert_eq!(out.test_metrics.accuracy, 1.0);
        assert_eq!(out.overfitting_gap, 0.0);
        let saved: TrainedModel = load_json(&out.trained_model_file_path).unwrap();
        assert_eq!(saved.preprocessor_file_path, input.transformed_object_file_path);
    }

    #[test]
    fn test_cancelled_trainer_persists_no_model() {
        let dir = tempfile::tempdir().unwrap();
        let data = dataset(|i| if i >= 10 { 1.0 } else { 0.0 });
        let input = artifact(dir.path(), &data, &data);
        let token = CancellationToken::new();
        token.cancel();

        let err = ModelTrainer::new(TrainerConfig::default(), paths(dir.path()))
            .with_cancellation(token)
            .run(&input)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled(_)));
        assert!(!paths(dir.path()).trained_model_file_path.exists());
    }

    #[test]
    fn test_low_test_accuracy_fails() {
        let dir = tempfile::tempdir().unwrap();
        let train = dataset(|i| if i >= 10 { 1.0 } else { 0.0 });
        let inverted = dataset(|i| if i >= 10 { 0.0 } else { 1.0 });
        let input = artifact(dir.path(), &train, &inverted);

        let err = ModelTrainer::new(TrainerConfig::default(), paths(dir.path()))
            .run(&input)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
        assert!(!paths(dir.path()).trained_model_file_path.exists());
    }
}
