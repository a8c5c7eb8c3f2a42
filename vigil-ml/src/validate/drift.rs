//! Per-column distribution drift between a reference and a candidate snapshot.
//!
//! Each column is dispatched to a [`DriftStrategy`] on its declared schema
//! kind, falling back to the kind inferred from its reference values: a
//! two-sample Kolmogorov-Smirnov test for numeric columns and an L1 distance
//! between frequency tables for categorical ones.
//! Columns that cannot be compared are skipped and reported, never failed.

use crate::cancel::{CancellationToken, checkpoint};
use crate::data::schema::{ColumnKind, SchemaDefinition, infer_column_kind};
use crate::data::source::DataBatch;
use crate::error::Result;
use crate::persistence::atomic_write_yaml;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;
use std::path::Path;

pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.05;

/// Comparison method behind a drift record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftMethod {
    KsTest,
    L1Distance,
}

/// Drift outcome for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDriftRecord {
    pub method: DriftMethod,
    /// Set for statistical tests; low values mean drift.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    /// Set for distance methods; high values mean drift.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_score: Option<f64>,
    pub drift_detected: bool,
}

/// Column name -> drift record, serialized as a plain mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriftReport {
    pub columns: BTreeMap<String, ColumnDriftRecord>,
}

impl DriftReport {
    pub fn get(&self, column: &str) -> Option<&ColumnDriftRecord> {
        self.columns.get(column)
    }

    pub fn drifted_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, r)| r.drift_detected)
            .map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Why a column produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingInCandidate,
    NoComparableValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedColumn {
    pub column: String,
    pub reason: SkipReason,
}

/// Result of one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftOutcome {
    /// `false` iff at least one column drifted.
    pub status: bool,
    pub report: DriftReport,
    pub skipped: Vec<SkippedColumn>,
}

/// A way to compare two null-free samples of one column.
pub trait DriftStrategy: Send + Sync {
    fn method(&self) -> DriftMethod;

    /// `None` abstains, e.g. when a side has nothing comparable.
    fn compare(
        &self,
        reference: &[&Value],
        candidate: &[&Value],
        threshold: f64,
    ) -> Option<ColumnDriftRecord>;
}

// ---------------------------------------------------------------------------
// Kolmogorov-Smirnov
// ---------------------------------------------------------------------------

/// Two-sample KS test with the asymptotic p-value.
#[derive(Debug, Clone, Copy, Default)]
pub struct KolmogorovSmirnov;

impl DriftStrategy for KolmogorovSmirnov {
    fn method(&self) -> DriftMethod {
        DriftMethod::KsTest
    }

    fn compare(
        &self,
        reference: &[&Value],
        candidate: &[&Value],
        threshold: f64,
    ) -> Option<ColumnDriftRecord> {
        let mut a: Vec<f64> = reference.iter().filter_map(|v| v.as_f64()).collect();
        let mut b: Vec<f64> = candidate.iter().filter_map(|v| v.as_f64()).collect();
        if a.is_empty() || b.is_empty() {
            return None;
        }
        let p_value = ks_two_sample(&mut a, &mut b).p_value;
        Some(ColumnDriftRecord {
            method: self.method(),
            p_value: Some(p_value),
            distance_score: None,
            drift_detected: p_value < threshold,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// KS statistic `D = sup |F_a - F_b|` and its asymptotic p-value.
///
/// Sorts both samples in place. Both must be non-empty.
pub fn ks_two_sample(a: &mut [f64], b: &mut [f64]) -> KsResult {
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    let (n, m) = (a.len(), b.len());

    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }

    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    KsResult {
        statistic: d,
        p_value: kolmogorov_survival(lambda),
    }
}

/// `P(K > lambda)` for the Kolmogorov distribution.
pub fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let p = if lambda < 1.18 {
        let y = (-PI * PI / (8.0 * lambda * lambda)).exp();
        let cdf = (2.0 * PI).sqrt() / lambda * (y + y.powi(9) + y.powi(25) + y.powi(49));
        1.0 - cdf
    } else {
        let x = (-2.0 * lambda * lambda).exp();
        2.0 * (x - x.powi(4) + x.powi(9) - x.powi(16))
    };
    p.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// L1 distance
// ---------------------------------------------------------------------------

/// Sum of absolute frequency differences over the union of categories, in `[0, 2]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct L1Distance;

impl DriftStrategy for L1Distance {
    fn method(&self) -> DriftMethod {
        DriftMethod::L1Distance
    }

    fn compare(
        &self,
        reference: &[&Value],
        candidate: &[&Value],
        threshold: f64,
    ) -> Option<ColumnDriftRecord> {
        if reference.is_empty() || candidate.is_empty() {
            return None;
        }
        let distance = l1_distance(&frequencies(reference), &frequencies(candidate));
        Some(ColumnDriftRecord {
            method: self.method(),
            p_value: None,
            distance_score: Some(distance),
            drift_detected: distance > threshold,
        })
    }
}

/// Normalized frequency table keyed by category.
///
/// Keys are the JSON rendering of each value, so the number `1` and the
/// string `"1"` count as different categories.
pub fn frequencies(values: &[&Value]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(category_key(v)).or_default() += 1;
    }
    let total = values.len() as f64;
    counts
        .into_iter()
        .map(|(k, c)| (k, c as f64 / total))
        .collect()
}

/// L1 distance between two frequency tables.
pub fn l1_distance(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> f64 {
    let mut distance: f64 = a
        .iter()
        .map(|(k, fa)| (fa - b.get(k).copied().unwrap_or(0.0)).abs())
        .sum();
    distance += b
        .iter()
        .filter(|(k, _)| !a.contains_key(*k))
        .map(|(_, fb)| fb)
        .sum::<f64>();
    distance.clamp(0.0, 2.0)
}

fn category_key(v: &Value) -> String {
    v.to_string()
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Compares snapshots column by column.
pub struct DriftDetector {
    threshold: f64,
    strategies: HashMap<ColumnKind, Box<dyn DriftStrategy>>,
    declared: HashMap<String, ColumnKind>,
    cancel: CancellationToken,
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DRIFT_THRESHOLD)
    }
}

impl DriftDetector {
    /// Detector with KS for numeric and L1 distance for categorical columns.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            strategies: HashMap::new(),
            declared: HashMap::new(),
            cancel: CancellationToken::new(),
        }
        .with_strategy(ColumnKind::Numeric, Box::new(KolmogorovSmirnov))
        .with_strategy(ColumnKind::Categorical, Box::new(L1Distance))
    }

    /// Replace the strategy used for `kind`.
    pub fn with_strategy(mut self, kind: ColumnKind, strategy: Box<dyn DriftStrategy>) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    /// Dispatch columns on the kinds `schema` declares instead of inferring them.
    pub fn with_declared_kinds(mut self, schema: &SchemaDefinition) -> Self {
        self.declared = schema
            .names()
            .filter_map(|name| schema.declared_kind(name).map(|kind| (name.to_string(), kind)))
            .collect();
        self
    }

    /// Refuse to write a report once `token` has fired.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Compare every reference column present in `candidate`. Inputs are not modified.
    pub fn detect(&self, reference: &DataBatch, candidate: &DataBatch) -> DriftOutcome {
        let mut report = DriftReport::default();
        let mut skipped = Vec::new();

        for (ref_idx, column) in reference.columns.iter().enumerate() {
            let Some(cand_idx) = candidate.column_index(column) else {
                tracing::warn!(column = %column, "Column missing from candidate; skipping drift check");
                skipped.push(SkippedColumn {
                    column: column.clone(),
                    reason: SkipReason::MissingInCandidate,
                });
                continue;
            };

            let left: Vec<&Value> = reference.column_at(ref_idx).filter(|v| !v.is_null()).collect();
            let right: Vec<&Value> = candidate.column_at(cand_idx).filter(|v| !v.is_null()).collect();

            let record = self
                .declared
                .get(column)
                .copied()
                .or_else(|| infer_column_kind(left.iter().copied()))
                .and_then(|kind| self.strategies.get(&kind))
                .and_then(|strategy| strategy.compare(&left, &right, self.threshold));

            match record {
                Some(record) => {
                    tracing::debug!(
                        column = %column,
                        method = ?record.method,
                        p_value = ?record.p_value,
                        distance = ?record.distance_score,
                        drift = record.drift_detected,
                        "Compared column distributions"
                    );
                    report.columns.insert(column.clone(), record);
                }
                None => {
                    tracing::warn!(
                        column = %column,
                        reference_values = left.len(),
                        candidate_values = right.len(),
                        "Column has no comparable values; skipping drift check"
                    );
                    skipped.push(SkippedColumn {
                        column: column.clone(),
                        reason: SkipReason::NoComparableValues,
                    });
                }
            }
        }

        let drifted: Vec<&str> = report.drifted_columns().collect();
        let status = drifted.is_empty();
        tracing::info!(
            compared = report.len(),
            skipped = skipped.len(),
            drifted = ?drifted,
            threshold = self.threshold,
            "Drift detection finished"
        );

        DriftOutcome {
            status,
            report,
            skipped,
        }
    }

    /// [`detect`](Self::detect), then write the report as YAML to `report_path`,
    /// replacing any previous report.
    pub fn detect_and_persist(
        &self,
        reference: &DataBatch,
        candidate: &DataBatch,
        report_path: &Path,
    ) -> Result<DriftOutcome> {
        let outcome = self.detect(reference, candidate);
        checkpoint(&self.cancel, "drift report")?;
        atomic_write_yaml(report_path, &outcome.report)?;
        tracing::info!(path = %report_path.display(), "Wrote drift report");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn batch(columns: &[&str], rows: Vec<Vec<Value>>) -> DataBatch {
        DataBatch::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    fn numeric(values: impl IntoIterator<Item = f64>) -> Vec<Value> {
        values.into_iter().map(|v| json!(v)).collect()
    }

    #[test]
    fn test_ks_identical_samples_has_max_p_value() {
        let mut a: Vec<f64> = (0..50).map(f64::from).collect();
        let mut b = a.clone();
        b.reverse();
        let res = ks_two_sample(&mut a, &mut b);
        assert_eq!(res.statistic, 0.0);
        assert_eq!(res.p_value, 1.0);
    }

    #[test]
    fn test_ks_disjoint_samples_drift() {
        let mut a: Vec<f64> = (0..100).map(f64::from).collect();
        let mut b: Vec<f64> = (1000..1100).map(f64::from).collect();
        let res = ks_two_sample(&mut a, &mut b);
        assert_eq!(res.statistic, 1.0);
        assert!(res.p_value < 1e-10);
    }

    #[test]
    fn test_ks_p_value_decreases_with_shift() {
        let base: Vec<f64> = (0..200).map(|i| f64::from(i) / 10.0).collect();
        let mut last = 1.0;
        for shift in [0.0, 1.0, 3.0, 6.0, 10.0] {
            let mut a = base.clone();
            let mut b: Vec<f64> = base.iter().map(|v| v + shift).collect();
            let p = ks_two_sample(&mut a, &mut b).p_value;
            assert!(p <= last, "p-value rose from {last} to {p} at shift {shift}");
            last = p;
        }
        assert!(last < DEFAULT_DRIFT_THRESHOLD);
    }

    #[test]
    fn test_ks_handles_ties() {
        let mut a = vec![1.0, 1.0, 2.0, 2.0];
        let mut b = vec![1.0, 2.0, 2.0, 2.0];
        let res = ks_two_sample(&mut a, &mut b);
        assert!((res.statistic - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_kolmogorov_survival_is_continuous_at_branch() {
        let below = kolmogorov_survival(1.18 - 1e-9);
        let above = kolmogorov_survival(1.18);
        assert!((below - above).abs() < 1e-4);
        assert_eq!(kolmogorov_survival(0.0), 1.0);
        assert!(kolmogorov_survival(5.0) < 1e-15);
    }

    #[test]
    fn test_l1_distance_of_known_frequencies() {
        let x = json!("x");
        let y = json!("y");
        let reference: Vec<&Value> = std::iter::repeat_n(&x, 9).chain([&y]).collect();
        let candidate: Vec<&Value> = std::iter::repeat_n(&x, 5).chain(std::iter::repeat_n(&y, 5)).collect();
        let record = L1Distance.compare(&reference, &candidate, 0.05).unwrap();
        assert!((record.distance_score.unwrap() - 0.8).abs() < 1e-12);
        assert!(record.drift_detected);
        assert_eq!(record.p_value, None);
    }

    #[test]
    fn test_l1_disjoint_categories_is_two() {
        let a = json!("a");
        let b = json!("b");
        assert_eq!(l1_distance(&frequencies(&[&a]), &frequencies(&[&b])), 2.0);
        assert_eq!(l1_distance(&frequencies(&[&a, &b]), &frequencies(&[&b, &a])), 0.0);
    }

    #[test]
    fn test_detect_dispatches_by_reference_kind() {
        let reference = batch(
            &["num", "cat"],
            (0..20).map(|i| vec![json!(i), json!(if i % 2 == 0 { "a" } else { "b" })]).collect(),
        );
        let candidate = reference.clone();
        let outcome = DriftDetector::default().detect(&reference, &candidate);

        assert!(outcome.status);
        assert_eq!(outcome.report.get("num").unwrap().method, DriftMethod::KsTest);
        assert_eq!(outcome.report.get("num").unwrap().p_value, Some(1.0));
        assert_eq!(outcome.report.get("cat").unwrap().method, DriftMethod::L1Distance);
        assert_eq!(outcome.report.get("cat").unwrap().distance_score, Some(0.0));
    }

    #[test]
    fn test_detect_skips_missing_and_empty_columns() {
        let reference = batch(
            &["a", "gone", "empty"],
            vec![
                vec![json!(1), json!(1), Value::Null],
                vec![json!(2), json!(2), Value::Null],
            ],
        );
        let candidate = batch(
            &["a", "empty"],
            vec![vec![json!(1), json!(3)], vec![json!(2), Value::Null]],
        );
        let outcome = DriftDetector::default().detect(&reference, &candidate);

        assert!(outcome.status);
        assert_eq!(outcome.report.len(), 1);
        assert_eq!(
            outcome.skipped,
            vec![
                SkippedColumn {
                    column: "gone".into(),
                    reason: SkipReason::MissingInCandidate
                },
                SkippedColumn {
                    column: "empty".into(),
                    reason: SkipReason::NoComparableValues
                },
            ]
        );
    }

    #[test]
    fn test_detect_abstains_when_candidate_side_all_null() {
        let reference = batch(&["a"], vec![vec![json!(1)], vec![json!(2)]]);
        let candidate = batch(&["a"], vec![vec![Value::Null]]);
        let outcome = DriftDetector::default().detect(&reference, &candidate);
        assert!(outcome.report.is_empty());
        assert_eq!(outcome.skipped[0].reason, SkipReason::NoComparableValues);
    }

    #[test]
    fn test_any_drifted_column_fails_status() {
        let reference = batch(&["n"], numeric((0..100).map(f64::from)).into_iter().map(|v| vec![v]).collect());
        let candidate = batch(&["n"], numeric((500..600).map(f64::from)).into_iter().map(|v| vec![v]).collect());
        let outcome = DriftDetector::default().detect(&reference, &candidate);
        assert!(!outcome.status);
        assert_eq!(outcome.report.drifted_columns().collect::<Vec<_>>(), vec!["n"]);
    }

    struct AlwaysDrift;

    impl DriftStrategy for AlwaysDrift {
        fn method(&self) -> DriftMethod {
            DriftMethod::L1Distance
        }

        fn compare(&self, _: &[&Value], _: &[&Value], _: f64) -> Option<ColumnDriftRecord> {
            Some(ColumnDriftRecord {
                method: DriftMethod::L1Distance,
                p_value: None,
                distance_score: Some(2.0),
                drift_detected: true,
            })
        }
    }

    #[test]
    fn test_custom_strategy_replaces_default() {
        let table = batch(&["c"], vec![vec![json!("a")]]);
        let detector = DriftDetector::default().with_strategy(ColumnKind::Categorical, Box::new(AlwaysDrift));
        assert!(!detector.detect(&table, &table).status);
    }

    #[test]
    fn test_number_and_string_are_distinct_categories() {
        let one = json!(1);
        let one_str = json!("1");
        assert_eq!(frequencies(&[&one, &one_str]).len(), 2);

        let record = L1Distance.compare(&[&one], &[&one_str], 0.05).unwrap();
        assert_eq!(record.distance_score, Some(2.0));
        assert!(record.drift_detected);
    }

    #[test]
    fn test_declared_kind_overrides_inferred_kind() {
        let schema = SchemaDefinition::from_yaml("columns:\n  - code: object\n  - score\nnumerical_columns:\n  - score\n").unwrap();
        let reference = batch(
            &["code", "score"],
            (0..10).map(|i| vec![json!(i % 3), json!(i)]).collect(),
        );
        let candidate = reference.clone();

        let inferred = DriftDetector::default().detect(&reference, &candidate);
        assert_eq!(inferred.report.get("code").unwrap().method, DriftMethod::KsTest);

        let declared = DriftDetector::default()
            .with_declared_kinds(&schema)
            .detect(&reference, &candidate);
        assert_eq!(declared.report.get("code").unwrap().method, DriftMethod::L1Distance);
        assert_eq!(declared.report.get("code").unwrap().distance_score, Some(0.0));
        assert_eq!(declared.report.get("score").unwrap().method, DriftMethod::KsTest);
    }

    #[test]
    fn test_declared_numeric_column_without_numbers_is_skipped() {
        let schema = SchemaDefinition::from_yaml("columns:\n  - level: float64\n").unwrap();
        let table = batch(&["level"], vec![vec![json!("low")], vec![json!("high")]]);
        let outcome = DriftDetector::default()
            .with_declared_kinds(&schema)
            .detect(&table, &table);
        assert!(outcome.report.is_empty());
        assert_eq!(outcome.skipped[0].reason, SkipReason::NoComparableValues);
    }

    #[test]
    fn test_cancelled_detector_writes_no_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("drift_store").join("report.yaml");
        let table = batch(&["a"], vec![vec![json!(1)], vec![json!(2)]]);
        let token = CancellationToken::new();
        token.cancel();

        let err = DriftDetector::default()
            .with_cancellation(token)
            .detect_and_persist(&table, &table, &path)
            .unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::Cancelled(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_report_yaml_shape() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("drift_store").join("report.yaml");
        let table = batch(&["a", "b"], vec![vec![json!(1), json!("x")], vec![json!(2), json!("y")]]);

        DriftDetector::default()
            .detect_and_persist(&table, &table, &path)
            .unwrap();
        let yaml: serde_yaml::Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(yaml["a"]["method"], serde_yaml::Value::from("ks_test"));
        assert_eq!(yaml["a"]["drift_detected"], serde_yaml::Value::from(false));
        assert_eq!(yaml["b"]["distance_score"], serde_yaml::Value::from(0.0));
        assert!(yaml["b"].get("p_value").is_none());
    }
}
