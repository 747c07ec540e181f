use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// RMSE, MAE and R² of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.is_empty() || actual.len() != predicted.len() {
            return Err(ForecastError::invalid_parameter(format!(
                "metrics need equally long non-empty series ({} vs {})",
                actual.len(),
                predicted.len()
            )));
        }
        Ok(Self {
            rmse: rmse(actual, predicted),
            mae: mae(actual, predicted),
            r2: r2(actual, predicted),
        })
    }

    /// Element-wise mean of several evaluations.
    pub fn mean(all: &[RegressionMetrics]) -> Option<Self> {
        if all.is_empty() {
            return None;
        }
        let n = all.len() as f64;
        Some(Self {
            rmse: all.iter().map(|m| m.rmse).sum::<f64>() / n,
            mae: all.iter().map(|m| m.mae).sum::<f64>() / n,
            r2: all.iter().map(|m| m.r2).sum::<f64>() / n,
        })
    }
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    (actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum::<f64>() / n).sqrt()
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / n
}

/// Coefficient of determination. A constant `actual` scores 1 when matched
/// exactly and 0 otherwise.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
