/// Common capability of the regression strategies
///
/// Inputs are already standardized, fully dense rows.

use crate::error::{ForecastError, Result};

pub trait Regressor: Send + Sync {
    /// Fit on `x` (one row per sample) against `y`.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;

    /// Predict a single row.
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    fn is_fitted(&self) -> bool;

    fn name(&self) -> &str;
}

/// Check shape and finiteness of a training set; returns the feature count.
pub fn validate_training_data(x: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    if x.is_empty() {
        return Err(ForecastError::invalid_parameter("training set is empty"));
    }
    if x.len() != y.len() {
        return Err(ForecastError::invalid_parameter(format!(
            "{} feature rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 {
        return Err(ForecastError::invalid_parameter("training rows have no features"));
    }
    for (i, row) in x.iter().enumerate() {
        if row.len() != width {
            return Err(ForecastError::SchemaMismatch(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                width
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::numerical(format!("row {} contains a non-finite feature", i)));
        }
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::numerical("target contains a non-finite value"));
    }
    Ok(width)
}

/// Check a prediction row against the fitted width.
pub fn check_row_width(row: &[f64], expected: usize) -> Result<()> {
    if row.len() != expected {
        return Err(ForecastError::SchemaMismatch(format!(
            "row has {} features, model was fitted on {}",
            row.len(),
            expected
        )));
    }
    Ok(())
}

/// The most recent `max_rows` rows of a training set.
pub fn recent_rows<'a>(x: &'a [Vec<f64>], y: &'a [f64], max_rows: usize) -> (&'a [Vec<f64>], &'a [f64]) {
    if max_rows == 0 || x.len() <= max_rows {
        return (x, y);
    }
    let start = x.len() - max_rows;
    (&x[start..], &y[start..])
}
