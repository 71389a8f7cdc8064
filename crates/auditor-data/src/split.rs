//! Seeded down-sampling and train/test splitting.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use auditor_common::error::{AuditorError, Result};

use crate::encode::PreparedDataset;

/// Seeded generator, or entropy-seeded when no seed is given.
pub fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl PreparedDataset {
    /// Draw `n` rows without replacement when the dataset is larger than `n`.
    pub fn subsample(&self, n: usize, seed: u64) -> PreparedDataset {
        if self.n_rows() <= n {
            return self.clone();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let indices = rand::seq::index::sample(&mut rng, self.n_rows(), n).into_vec();
        self.select(&indices)
    }
}

#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: PreparedDataset,
    pub test: PreparedDataset,
}

/// Shuffle and split; the test side gets `ceil(test_size * n)` rows.
pub fn train_test_split(
    dataset: &PreparedDataset,
    test_size: f64,
    seed: Option<u64>,
) -> Result<TrainTestSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AuditorError::invalid_data(format!(
            "test_size must be between 0 and 1, got {test_size}"
        )));
    }

    let n = dataset.n_rows();
    let n_test = (n as f64 * test_size).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(AuditorError::invalid_data(format!(
            "split would result in empty train or test set (n={n}, n_train={n_train}, n_test={n_test})"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng_from(seed));

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok(TrainTestSplit {
        train: dataset.select(train_idx),
        test: dataset.select(test_idx),
    })
}
