//! Impute missing features and persist numeric train/test matrices.

use crate::artifact::{DataTransformationArtifact, DataValidationArtifact};
use crate::cancel::{CancellationToken, checkpoint};
use crate::config::{TransformationConfig, TransformationPaths};
use crate::data::source::read_csv;
use crate::data::transform::{KnnImputer, TransformedDataset, split_features_target};
use crate::error::Result;
use crate::persistence::atomic_write_json;

pub struct DataTransformation {
    config: TransformationConfig,
    paths: TransformationPaths,
    cancel: CancellationToken,
}

impl DataTransformation {
    pub fn new(config: TransformationConfig, paths: TransformationPaths) -> Self {
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

    /// Fails with `ValidationRejected` when the artifact carries no validated tables.
    pub fn run(&self, validation: &DataValidationArtifact) -> Result<DataTransformationArtifact> {
        let (train_path, test_path) = validation.valid_paths()?;
        let train = read_csv(train_path)?;
        let test = read_csv(test_path)?;

        let target = self.config.target_column.as_str();
        let (train_x, train_y) = split_features_target(&train, target)?;
        let (test_x, test_y) = split_features_target(&test, target)?;

        let imputer = KnnImputer::fit(&train_x, self.config.n_neighbors)?;
        tracing::info!(
            n_neighbors = imputer.n_neighbors,
            features = imputer.feature_names.len(),
            train_missing = train_x.missing_count(),
            test_missing = test_x.missing_count(),
            "Fitted KNN imputer"
        );

        let train_out = TransformedDataset::new(
            train_x.feature_names.clone(),
            target,
            imputer.transform(&train_x)?,
            &train_y,
        );
        let test_out = TransformedDataset::new(
            test_x.feature_names.clone(),
            target,
            imputer.transform(&test_x)?,
            &test_y,
        );

        checkpoint(&self.cancel, "transformed matrices")?;
        atomic_write_json(&self.paths.transformed_train_file_path, &train_out)?;
        atomic_write_json(&self.paths.transformed_test_file_path, &test_out)?;
        atomic_write_json(&self.paths.transformed_object_file_path, &imputer)?;

        Ok(DataTransformationArtifact {
            transformed_object_file_path: self.paths.transformed_object_file_path.clone(),
            transformed_train_file_path: self.paths.transformed_train_file_path.clone(),
            transformed_test_file_path: self.paths.transformed_test_file_path.clone(),
        })
    }
}
