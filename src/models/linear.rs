use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::models::linalg::{dot, solve_spd};
use crate::models::traits::{check_row_width, validate_training_data, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    /// Relative diagonal jitter added to `X^T X` so collinear columns stay solvable
    pub ridge_jitter: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { ridge_jitter: 1e-8 }
    }
}

/// Ordinary least squares with an intercept, solved through the normal
/// equations on centered data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    params: LinearParams,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new(params: LinearParams) -> Self {
        Self {
            params,
            coefficients: Vec::new(),
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let p = validate_training_data(x, y)?;
        let n = x.len() as f64;

        let mut x_mean = vec![0.0; p];
        for row in x {
            for (m, v) in x_mean.iter_mut().zip(row.iter()) {
                *m += v / n;
            }
        }
        let y_mean = y.iter().sum::<f64>() / n;

        let mut xtx = vec![0.0; p * p];
        let mut xty = vec![0.0; p];
        let mut centered = vec![0.0; p];
        for (row, target) in x.iter().zip(y.iter()) {
            for j in 0..p {
                centered[j] = row[j] - x_mean[j];
            }
            let yc = target - y_mean;
            for i in 0..p {
                let ci = centered[i];
                xty[i] += ci * yc;
                for j in i..p {
                    xtx[i * p + j] += ci * centered[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                xtx[i * p + j] = xtx[j * p + i];
            }
        }

        let coefficients = solve_spd(&xtx, p, &xty, self.params.ridge_jitter)?;
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::numerical("least-squares solution is not finite"));
        }

        self.intercept = y_mean - dot(&coefficients, &x_mean);
        self.coefficients = coefficients;
        debug!("Linear regression fitted on {} rows x {} features", x.len(), p);
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted);
        }
        check_row_width(row, self.coefficients.len())?;
        Ok(self.intercept + dot(&self.coefficients, row))
    }

    fn is_fitted(&self) -> bool {
        !self.coefficients.is_empty()
    }

    fn name(&self) -> &str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_exact_linear_relation() {
        let x: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![i as f64 / 10.0, ((i * 7) % 11) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 + 2.0 * r[0] - 0.5 * r[1]).collect();

        let mut model = LinearRegression::new(LinearParams::default());
        model.fit(&x, &y).unwrap();

        assert!((model.intercept() - 3.0).abs() < 1e-5);
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-5);
        assert!((model.coefficients()[1] + 0.5).abs() < 1e-5);
        assert!((model.predict_row(&[1.0, 2.0]).unwrap() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_constant_column_does_not_break_fit() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| 1.0 + i as f64).collect();
        let mut model = LinearRegression::new(LinearParams::default());
        model.fit(&x, &y).unwrap();
        assert!((model.predict_row(&[30.0, 0.0]).unwrap() - 31.0).abs() < 1e-4);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new(LinearParams::default());
        assert!(matches!(model.predict_row(&[1.0]), Err(ForecastError::NotFitted)));
    }
}
