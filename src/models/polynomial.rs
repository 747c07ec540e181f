use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::models::linalg::{cholesky, cholesky_solve, dot};
use crate::models::traits::{check_row_width, recent_rows, validate_training_data, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolynomialParams {
    /// L2 penalty on the degree-2 coefficients
    pub alpha: f64,
    /// Only the most recent rows are used; the solve is cubic in this
    pub max_rows: usize,
}

impl Default for PolynomialParams {
    fn default() -> Self {
        Self { alpha: 1.0, max_rows: 1500 }
    }
}

/// Inner product of the full degree-2 polynomial expansions of `a` and `b`
/// (bias, linear terms and every product `x_i x_j` with `i <= j`).
pub fn poly2_kernel(a: &[f64], b: &[f64]) -> f64 {
    let mut s = 0.0;
    let mut sq = 0.0;
    for (x, z) in a.iter().zip(b.iter()) {
        let p = x * z;
        s += p;
        sq += p * p;
    }
    1.0 + s + 0.5 * (s * s + sq)
}

/// Ridge regression on degree-2 polynomial features, solved in dual form.
///
/// Equivalent to expanding every row into its quadratic terms and fitting a
/// ridge with an unpenalized intercept, without materializing the expansion.
/// The intercept is handled by centering the kernel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolynomialRidge {
    params: PolynomialParams,
    support: Vec<Vec<f64>>,
    dual: Vec<f64>,
    kernel_col_means: Vec<f64>,
    kernel_grand_mean: f64,
    y_mean: f64,
}

impl PolynomialRidge {
    pub fn new(params: PolynomialParams) -> Self {
        Self { params, ..Default::default() }
    }

    pub fn training_rows(&self) -> usize {
        self.support.len()
    }
}

impl Regressor for PolynomialRidge {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        validate_training_data(x, y)?;
        if self.params.alpha <= 0.0 {
            return Err(ForecastError::invalid_parameter("polynomial ridge needs alpha > 0"));
        }
        let (x, y) = recent_rows(x, y, self.params.max_rows);
        let n = x.len();

        let mut k = vec![0.0; n * n];
        for i in 0..n {
            for j in i..n {
                let v = poly2_kernel(&x[i], &x[j]);
                k[i * n + j] = v;
                k[j * n + i] = v;
            }
        }

        let col_means: Vec<f64> = (0..n).map(|j| (0..n).map(|i| k[i * n + j]).sum::<f64>() / n as f64).collect();
        let grand_mean = col_means.iter().sum::<f64>() / n as f64;

        // centered kernel plus ridge penalty
        let mut system = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                system[i * n + j] = k[i * n + j] - col_means[i] - col_means[j] + grand_mean;
            }
            system[i * n + i] += self.params.alpha;
        }

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let yc: Vec<f64> = y.iter().map(|v| v - y_mean).collect();

        let l = cholesky(&system, n)?;
        let dual = cholesky_solve(&l, n, &yc);
        if dual.iter().any(|a| !a.is_finite()) {
            return Err(ForecastError::numerical("polynomial ridge dual solution is not finite"));
        }

        self.support = x.to_vec();
        self.dual = dual;
        self.kernel_col_means = col_means;
        self.kernel_grand_mean = grand_mean;
        self.y_mean = y_mean;
        debug!("Polynomial ridge fitted on {} rows (alpha={})", n, self.params.alpha);
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted);
        }
        check_row_width(row, self.support[0].len())?;

        let k_row: Vec<f64> = self.support.iter().map(|s| poly2_kernel(row, s)).collect();
        let row_mean = k_row.iter().sum::<f64>() / k_row.len() as f64;
        let centered: Vec<f64> = k_row
            .iter()
            .zip(self.kernel_col_means.iter())
            .map(|(k, m)| k - row_mean - m + self.kernel_grand_mean)
            .collect();
        Ok(self.y_mean + dot(&self.dual, &centered))
    }

    fn is_fitted(&self) -> bool {
        !self.support.is_empty()
    }

    fn name(&self) -> &str {
        "polynomial"
    }
}
