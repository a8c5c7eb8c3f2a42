//! The validation gate between ingestion and transformation.
//!
//! Both tables are checked against the schema first. If either fails, the
//! run is rejected without computing drift or writing a report, and the
//! failing sources are recorded. Otherwise drift is measured train vs test,
//! the report is written, and both tables are copied to the validated
//! location whatever the drift outcome.
//!
//! A cancelled run stops at the next write and leaves no new report or
//! validated table behind.

use crate::artifact::{DataIngestionArtifact, DataValidationArtifact};
use crate::cancel::{CancellationToken, checkpoint};
use crate::config::{ValidationConfig, ValidationPaths};
use crate::data::schema::SchemaDefinition;
use crate::data::source::{read_csv, write_csv};
use crate::error::Result;
use crate::validate::{DriftDetector, DriftOutcome, validate_columns};

pub struct DataValidation {
    config: ValidationConfig,
    schema: SchemaDefinition,
    paths: ValidationPaths,
    detector: DriftDetector,
    cancel: CancellationToken,
}

impl DataValidation {
    pub fn new(config: ValidationConfig, schema: SchemaDefinition, paths: ValidationPaths) -> Self {
        let detector = DriftDetector::new(config.drift_threshold).with_declared_kinds(&schema);
        Self {
            config,
            schema,
            paths,
            detector,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.detector = self.detector.with_cancellation(token.clone());
        self.cancel = token;
        self
    }

    pub fn run(&self, ingestion: &DataIngestionArtifact) -> Result<DataValidationArtifact> {
        let train = read_csv(&ingestion.trained_file_path)?;
        let test = read_csv(&ingestion.test_file_path)?;

        let train_check = validate_columns(&train, &self.schema, self.config.schema_mode);
        let test_check = validate_columns(&test, &self.schema, self.config.schema_mode);
        if !train_check.passed() || !test_check.passed() {
            let failed_train = (!train_check.passed()).then(|| ingestion.trained_file_path.clone());
            let failed_test = (!test_check.passed()).then(|| ingestion.test_file_path.clone());
            tracing::warn!(
                train_passed = train_check.passed(),
                test_passed = test_check.passed(),
                "Schema check failed; dataset rejected"
            );
            return Ok(DataValidationArtifact::rejected(
                failed_train,
                failed_test,
                self.paths.drift_report_file_path.clone(),
            ));
        }

        checkpoint(&self.cancel, "drift detection")?;
        let DriftOutcome { status, report, .. } = self
            .detector
            .detect_and_persist(&train, &test, &self.paths.drift_report_file_path)?;

        checkpoint(&self.cancel, "validated train table")?;
        write_csv(&self.paths.valid_train_file_path, &train)?;
        checkpoint(&self.cancel, "validated test table")?;
        write_csv(&self.paths.valid_test_file_path, &test)?;

        tracing::info!(
            status,
            columns = report.len(),
            report = %self.paths.drift_report_file_path.display(),
            "Data validation complete"
        );
        Ok(DataValidationArtifact::accepted(status, &self.paths))
    }
}
