use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::{Pollutant, TimeSeriesFrame};
use crate::error::{ForecastError, Result};
use crate::features::schema::{
    current_index, lag_index, roll_mean_index, roll_std_index, FEATURE_COUNT, LAGS, WINDOWS,
};
use crate::features::temporal::temporal_features;

/// Fixed-schema feature row for one timestamp. `None` marks a feature that
/// cannot be computed from the available history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<Option<f64>>,
}

impl FeatureVector {
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn is_available(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Project onto a subset of columns.
    pub fn select(&self, columns: &[usize]) -> Vec<Option<f64>> {
        columns.iter().map(|i| self.get(*i)).collect()
    }
}

/// Turns a `TimeSeriesFrame` into one `FeatureVector` per row.
///
/// Every feature at row `t` reads only rows `<= t`: lags and rolling windows
/// look strictly backwards, and only the `<p>_current` columns read row `t`.
#[derive(Debug, Clone, Default)]
pub struct FeatureEngine;

impl FeatureEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn build_features(&self, frame: &TimeSeriesFrame) -> Vec<FeatureVector> {
        let rows: Vec<FeatureVector> = (0..frame.len()).filter_map(|i| self.row(frame, i)).collect();
        debug!(
            "Built {} feature vectors ({} columns) for '{}'",
            rows.len(),
            FEATURE_COUNT,
            frame.location()
        );
        rows
    }

    /// Feature vector for a single row of the frame.
    pub fn build_row(&self, frame: &TimeSeriesFrame, index: usize) -> Result<FeatureVector> {
        self.row(frame, index).ok_or_else(|| {
            ForecastError::invalid_parameter(format!(
                "row {} out of bounds ({} rows)",
                index,
                frame.len()
            ))
        })
    }

    fn row(&self, frame: &TimeSeriesFrame, index: usize) -> Option<FeatureVector> {
        let timestamp = frame.timestamp(index)?;
        let mut values: Vec<Option<f64>> = vec![None; FEATURE_COUNT];

        for (slot, v) in values.iter_mut().zip(temporal_features(timestamp)) {
            *slot = Some(v);
        }

        for pollutant in Pollutant::ALL {
            let column = frame.column(pollutant);

            for (pos, lag) in LAGS.iter().enumerate() {
                if index >= *lag {
                    values[lag_index(pollutant, pos)] = column[index - lag];
                }
            }

            for (pos, window) in WINDOWS.iter().enumerate() {
                if index < *window {
                    continue;
                }
                let (mean, std) = window_stats(&column[index - window..index]);
                values[roll_mean_index(pollutant, pos)] = mean;
                values[roll_std_index(pollutant, pos)] = std;
            }

            values[current_index(pollutant)] = column[index];
        }

        Some(FeatureVector { timestamp, values })
    }
}

/// Mean (needs one observation) and sample standard deviation (needs two)
/// of the observed cells in a window.
fn window_stats(window: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let observed: Vec<f64> = window.iter().flatten().copied().collect();
    if observed.is_empty() {
        return (None, None);
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    if observed.len() < 2 {
        return (Some(mean), None);
    }
    let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (Some(mean), Some(variance.sqrt()))
}
