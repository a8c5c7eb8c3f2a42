//! Seeded train/test splitting.

use crate::data::source::DataBatch;
use crate::error::{PipelineError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Shuffle rows with `seed` and split off `ceil(n * test_ratio)` rows as the test set.
pub fn train_test_split(
    batch: &DataBatch,
    test_ratio: f64,
    seed: u64,
) -> Result<(DataBatch, DataBatch)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(PipelineError::config(format!(
            "test ratio must be in (0, 1), got {test_ratio}"
        )));
    }
    let n = batch.row_count();
    let n_test = (n as f64 * test_ratio).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::dataset(format!(
            "cannot split {n} rows with test ratio {test_ratio}"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let (test_idx, train_idx) = order.split_at(n_test);

    let take = |idx: &[usize]| {
        DataBatch::new(
            batch.columns.clone(),
            idx.iter().map(|&i| batch.rows[i].clone()).collect(),
        )
    };
    Ok((take(train_idx)?, take(test_idx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(n: usize) -> DataBatch {
        DataBatch::new(
            vec!["i".into()],
            (0..n).map(|i| vec![json!(i)]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(&batch(100), 0.2, 42).unwrap();
        assert_eq!(train.row_count(), 80);
        assert_eq!(test.row_count(), 20);
    }

    #[test]
    fn test_split_is_deterministic_and_disjoint() {
        let (a_train, a_test) = train_test_split(&batch(50), 0.3, 7).unwrap();
        let (b_train, b_test) = train_test_split(&batch(50), 0.3, 7).unwrap();
        assert_eq!(a_train, b_train);
        assert_eq!(a_test, b_test);

        let mut all: Vec<i64> = a_train
            .rows
            .iter()
            .chain(a_test.rows.iter())
            .map(|r| r[0].as_i64().unwrap())
            .collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<i64>>());
    }

    #[test]
    fn test_split_too_small() {
        assert!(train_test_split(&batch(1), 0.2, 1).is_err());
        assert!(train_test_split(&batch(10), 0.0, 1).is_err());
    }
}
