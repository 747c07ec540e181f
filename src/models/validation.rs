use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{ForecastError, Result};

/// One chronological train/test split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window cross-validation for time series.
///
/// The data is cut into `n_splits + 1` equal blocks (the remainder goes to
/// the first training window). Fold `i` trains on everything before block
/// `i + 1` and tests on that block, so test rows always come after train rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSeriesSplit {
    n_splits: usize,
}

impl TimeSeriesSplit {
    pub fn new(n_splits: usize) -> Result<Self> {
        if n_splits < 2 {
            return Err(ForecastError::invalid_parameter(format!(
                "time series split needs at least 2 folds, got {}",
                n_splits
            )));
        }
        Ok(Self { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Smallest sample count that yields non-empty folds.
    pub fn min_samples(&self) -> usize {
        self.n_splits + 1
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if n_samples < self.min_samples() {
            return Err(ForecastError::invalid_parameter(format!(
                "cannot make {} folds from {} samples",
                self.n_splits, n_samples
            )));
        }
        let test_size = n_samples / (self.n_splits + 1);
        let first_test = n_samples - self.n_splits * test_size;

        Ok((0..self.n_splits)
            .map(|i| {
                let start = first_test + i * test_size;
                Fold {
                    index: i,
                    train: 0..start,
                    test: start..start + test_size,
                }
            })
            .collect())
    }
}
