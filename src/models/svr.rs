use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::models::traits::{check_row_width, recent_rows, validate_training_data, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvrParams {
    pub c: f64,
    pub epsilon: f64,
    /// RBF width; `None` uses `1 / (n_features * var(X))`
    pub gamma: Option<f64>,
    pub tolerance: f64,
    pub max_iter: usize,
    pub max_rows: usize,
    pub seed: u64,
}

impl Default for SvrParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            gamma: None,
            tolerance: 1e-3,
            max_iter: 1000,
            max_rows: 1500,
            seed: 42,
        }
    }
}

fn rbf(a: &[f64], b: &[f64], gamma: f64) -> f64 {
    let d2: f64 = a.iter().zip(b.iter()).map(|(x, z)| (x - z) * (x - z)).sum();
    (-gamma * d2).exp()
}

/// Epsilon-insensitive support vector regression with an RBF kernel.
///
/// The bias is folded into the kernel (`K + 1`), which turns the dual into
/// a box-constrained problem solved by randomized coordinate descent.
/// Targets are standardized internally so `epsilon` is in units of the
/// target's standard deviation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpsilonSvr {
    params: SvrParams,
    gamma: f64,
    support: Vec<Vec<f64>>,
    coefficients: Vec<f64>,
    y_mean: f64,
    y_std: f64,
}

impl EpsilonSvr {
    pub fn new(params: SvrParams) -> Self {
        Self { params, ..Default::default() }
    }

    pub fn support_vectors(&self) -> usize {
        self.support.len()
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Regressor for EpsilonSvr {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let width = validate_training_data(x, y)?;
        if self.params.c <= 0.0 || self.params.epsilon < 0.0 {
            return Err(ForecastError::invalid_parameter("SVR needs C > 0 and epsilon >= 0"));
        }
        let (x, y) = recent_rows(x, y, self.params.max_rows);
        let n = x.len();

        let gamma = match self.params.gamma {
            Some(g) if g > 0.0 => g,
            Some(g) => return Err(ForecastError::invalid_parameter(format!("invalid gamma {}", g))),
            None => {
                let count = (n * width) as f64;
                let mean = x.iter().flatten().sum::<f64>() / count;
                let var = x.iter().flatten().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
                if var > 0.0 { 1.0 / (width as f64 * var) } else { 1.0 }
            }
        };

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let y_var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_std = if y_var > 1e-24 { y_var.sqrt() } else { 1.0 };
        let ys: Vec<f64> = y.iter().map(|v| (v - y_mean) / y_std).collect();

        let mut k = vec![0.0; n * n];
        for i in 0..n {
            k[i * n + i] = 2.0;
            for j in (i + 1)..n {
                let v = rbf(&x[i], &x[j], gamma) + 1.0;
                k[i * n + j] = v;
                k[j * n + i] = v;
            }
        }

        let c = self.params.c;
        let eps = self.params.epsilon;
        let mut beta = vec![0.0; n];
        // f = K beta
        let mut f = vec![0.0; n];
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = Pcg64::seed_from_u64(self.params.seed);
        let mut converged = false;
        let mut epochs = 0;

        for epoch in 0..self.params.max_iter {
            epochs = epoch + 1;
            order.shuffle(&mut rng);
            let mut max_step: f64 = 0.0;

            for &i in &order {
                let kii = k[i * n + i];
                let grad = f[i] - ys[i];
                let z = beta[i] - grad / kii;
                let shrunk = z.signum() * (z.abs() - eps / kii).max(0.0);
                let updated = shrunk.clamp(-c, c);
                let delta = updated - beta[i];
                if delta != 0.0 {
                    beta[i] = updated;
                    let row = &k[i * n..(i + 1) * n];
                    for (fj, kij) in f.iter_mut().zip(row.iter()) {
                        *fj += delta * kij;
                    }
                    max_step = max_step.max(delta.abs());
                }
            }

            if max_step < self.params.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!("SVR did not converge within {} epochs", self.params.max_iter);
        }

        let mut support = Vec::new();
        let mut coefficients = Vec::new();
        for (i, b) in beta.iter().enumerate() {
            if *b != 0.0 {
                support.push(x[i].clone());
                coefficients.push(*b);
            }
        }
        if coefficients.iter().any(|b| !b.is_finite()) {
            return Err(ForecastError::numerical("SVR dual solution is not finite"));
        }

        debug!(
            "SVR fitted on {} rows: {} support vectors, gamma={:.4}, {} epochs",
            n,
            support.len(),
            gamma,
            epochs
        );

        self.gamma = gamma;
        self.support = support;
        self.coefficients = coefficients;
        self.y_mean = y_mean;
        self.y_std = y_std;
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted);
        }
        if let Some(first) = self.support.first() {
            check_row_width(row, first.len())?;
        }
        let standardized: f64 = self
            .support
            .iter()
            .zip(self.coefficients.iter())
            .map(|(s, b)| b * (rbf(row, s, self.gamma) + 1.0))
            .sum();
        Ok(self.y_mean + self.y_std * standardized)
    }

    fn is_fitted(&self) -> bool {
        self.gamma > 0.0
    }

    fn name(&self) -> &str {
        "svr"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64 / n as f64 * 6.0 - 3.0]).collect();
        let y: Vec<f64> = x.iter().map(|r| 10.0 + 4.0 * r[0].sin()).collect();
        (x, y)
    }

    #[test]
    fn test_fits_smooth_signal() {
        let (x, y) = sine_data(120);
        let mut model = EpsilonSvr::new(SvrParams { c: 10.0, gamma: Some(1.0), ..SvrParams::default() });
        model.fit(&x, &y).unwrap();

        for probe in [-2.0f64, -0.5, 1.0, 2.5] {
            let pred = model.predict_row(&[probe]).unwrap();
            let truth = 10.0 + 4.0 * probe.sin();
            assert!((pred - truth).abs() < 0.8, "at {}: {} vs {}", probe, pred, truth);
        }
    }

    #[test]
    fn test_dual_coefficients_respect_box() {
        let (x, y) = sine_data(60);
        let mut model = EpsilonSvr::new(SvrParams::default());
        model.fit(&x, &y).unwrap();
        assert!(model.coefficients.iter().all(|b| b.abs() <= 1.0 + 1e-12));
        assert!(model.support_vectors() <= 60);
        assert!(model.gamma() > 0.0);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (x, y) = sine_data(50);
        let mut a = EpsilonSvr::new(SvrParams::default());
        let mut b = EpsilonSvr::new(SvrParams::default());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_target() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y = vec![7.0; 20];
        let mut model = EpsilonSvr::new(SvrParams::default());
        model.fit(&x, &y).unwrap();
        assert!((model.predict_row(&[3.0]).unwrap() - 7.0).abs() < 1e-9);
    }
}
