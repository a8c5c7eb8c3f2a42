//! Binary logistic regression fitted with batch gradient descent.

use crate::error::{PipelineError, Result};
use crate::training::metrics::TrainingMetrics;
use serde::{Deserialize, Serialize};

/// Per-feature z-score scaling fitted on the training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Standardizer {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut stds = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        // constant features pass through centred but unscaled
        for s in &mut stds {
            *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
        }
        Self { means, stds }
    }

    pub fn apply(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub scaler: Standardizer,
}

impl LogisticRegression {
    /// Fit on `rows` with labels in `{0, 1}`.
    pub fn fit(
        feature_names: Vec<String>,
        rows: &[Vec<f64>],
        labels: &[f64],
        epochs: usize,
        learning_rate: f64,
    ) -> Result<(Self, TrainingMetrics)> {
        if rows.is_empty() {
            return Err(PipelineError::training("no training rows"));
        }
        if rows.len() != labels.len() {
            return Err(PipelineError::training(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|y| **y != 0.0 && **y != 1.0) {
            return Err(PipelineError::training(format!(
                "labels must be 0 or 1, found {bad}"
            )));
        }
        let width = feature_names.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(PipelineError::training(format!(
                "row {i} has {} features, expected {width}",
                row.len()
            )));
        }

        let scaler = Standardizer::fit(rows);
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.apply(r)).collect();
        let mut model = Self {
            feature_names,
            weights: vec![0.0; width],
            bias: 0.0,
            scaler,
        };

        let n = scaled.len() as f64;
        let mut metrics = TrainingMetrics::default();
        for _ in 0..epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            let mut loss = 0.0;
            for (x, y) in scaled.iter().zip(labels) {
                let p = sigmoid(model.linear(x));
                let err = p - y;
                for (g, xi) in grad_w.iter_mut().zip(x) {
                    *g += err * xi;
                }
                grad_b += err;
                loss -= y * p.max(f64::EPSILON).ln() + (1.0 - y) * (1.0 - p).max(f64::EPSILON).ln();
            }
            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= learning_rate * g / n;
            }
            model.bias -= learning_rate * grad_b / n;
            metrics.record_epoch(loss / n);
        }

        tracing::debug!(
            epochs,
            final_loss = ?metrics.final_loss(),
            "Fitted logistic regression"
        );
        Ok((model, metrics))
    }

    fn linear(&self, scaled: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(scaled)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.linear(&self.scaler.apply(row)))
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter()
            .map(|r| if self.predict_proba(r) >= 0.5 { 1.0 } else { 0.0 })
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 5.0]).collect();
        let labels = (0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }).collect();
        (rows, labels)
    }

    #[test]
    fn test_fits_separable_data() {
        let (rows, labels) = separable();
        let (model, metrics) =
            LogisticRegression::fit(vec!["x".into(), "c".into()], &rows, &labels, 300, 0.5).unwrap();
        assert_eq!(model.predict(&rows), labels);
        assert_eq!(metrics.epochs_completed, 300);
        assert!(metrics.final_loss().unwrap() < metrics.loss_history[0]);
    }

    #[test]
    fn test_constant_feature_gets_unit_scale() {
        let (rows, _) = separable();
        let scaler = Standardizer::fit(&rows);
        assert_eq!(scaler.stds[1], 1.0);
        assert_eq!(scaler.apply(&[9.5, 5.0])[1], 0.0);
    }

    #[test]
    fn test_rejects_bad_labels_and_shapes() {
        let rows = vec![vec![1.0], vec![2.0]];
        assert!(LogisticRegression::fit(vec!["x".into()], &rows, &[0.0, 2.0], 10, 0.1).is_err());
        assert!(LogisticRegression::fit(vec!["x".into()], &rows, &[0.0], 10, 0.1).is_err());
        assert!(LogisticRegression::fit(vec!["x".into()], &[], &[], 10, 0.1).is_err());
    }
}
