//! Classifier fitting and evaluation metrics.

pub mod logistic;
pub mod metrics;

pub use logistic::{LogisticRegression, Standardizer};
pub use metrics::{ClassificationMetrics, TrainingMetrics};
