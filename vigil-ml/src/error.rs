//! Error types for the vigil-ml crate.

use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Validation rejected the dataset: {0}")]
    ValidationRejected(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// The run was cancelled before the named step wrote anything.
    #[error("Cancelled before {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A failure annotated with the pipeline stage it originated in.
    #[error("[{stage}] {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::ValidationRejected(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn cancelled(step: impl Into<String>) -> Self {
        Self::Cancelled(step.into())
    }

    /// Name of the stage this error was raised in, if it has been annotated.
    pub fn stage_name(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// The innermost error, with all stage annotations stripped.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<figment::Error> for PipelineError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Attach stage provenance to a fallible result.
pub trait StageContext<T> {
    fn stage(self, stage: &'static str) -> Result<T, PipelineError>;
}

impl<T, E: Into<PipelineError>> StageContext<T> for Result<T, E> {
    fn stage(self, stage: &'static str) -> Result<T, PipelineError> {
        self.map_err(|e| match e.into() {
            // Keep the innermost stage; outer callers only re-raise.
            tagged @ PipelineError::Stage { .. } => tagged,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        })
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_context_wraps_once() {
        let res: Result<(), PipelineError> = Err(PipelineError::dataset("empty collection"));
        let err = res.stage("data_ingestion").stage("pipeline").unwrap_err();
        assert_eq!(err.stage_name(), Some("data_ingestion"));
        assert!(matches!(err.root(), PipelineError::Dataset(_)));
        assert_eq!(err.to_string(), "[data_ingestion] Dataset error: empty collection");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let res: std::result::Result<(), std::io::Error> = Err(io);
        let err = res.stage("data_validation").unwrap_err();
        assert!(matches!(err.root(), PipelineError::Io(_)));
    }
}
