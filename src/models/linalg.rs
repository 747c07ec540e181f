/// Dense linear-algebra helpers on row-major `Vec<f64>` matrices.

use crate::error::{ForecastError, Result};

/// Dot product of two equally long slices.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Lower-triangular Cholesky factor of a symmetric positive definite
/// `n x n` matrix. Fails if a pivot is not strictly positive.
pub fn cholesky(a: &[f64], n: usize) -> Result<Vec<f64>> {
    if a.len() != n * n {
        return Err(ForecastError::numerical(format!(
            "expected {}x{} matrix, got {} entries",
            n,
            n,
            a.len()
        )));
    }

    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(ForecastError::numerical(format!(
                        "matrix not positive definite at pivot {} ({})",
                        i, sum
                    )));
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Ok(l)
}

/// Solve `L L^T x = b` given the Cholesky factor `L`.
pub fn cholesky_solve(l: &[f64], n: usize, b: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * y[k];
        }
        y[i] = sum / l[i * n + i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

/// Solve a symmetric positive (semi-)definite system, adding a growing
/// diagonal jitter until the factorization succeeds.
pub fn solve_spd(a: &[f64], n: usize, b: &[f64], jitter: f64) -> Result<Vec<f64>> {
    let scale = (0..n).map(|i| a[i * n + i].abs()).sum::<f64>() / n.max(1) as f64;
    let mut current = jitter * scale.max(1.0);
    let mut work = a.to_vec();

    for _ in 0..8 {
        for i in 0..n {
            work[i * n + i] = a[i * n + i] + current;
        }
        match cholesky(&work, n) {
            Ok(l) => return Ok(cholesky_solve(&l, n, b)),
            Err(_) => current = if current > 0.0 { current * 100.0 } else { 1e-10 },
        }
    }
    Err(ForecastError::numerical("system is singular even after regularization"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cholesky_solve_small_system() {
        // [[4, 2], [2, 3]] x = [2, 1]  ->  x = [0.5, 0]
        let a = vec![4.0, 2.0, 2.0, 3.0];
        let l = cholesky(&a, 2).unwrap();
        let x = cholesky_solve(&l, 2, &[2.0, 1.0]);
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = vec![1.0, 2.0, 2.0, 1.0];
        assert!(cholesky(&a, 2).is_err());
    }

    #[test]
    fn test_solve_spd_handles_singular_matrix() {
        // rank-one matrix
        let a = vec![1.0, 1.0, 1.0, 1.0];
        let x = solve_spd(&a, 2, &[2.0, 2.0], 1e-8).unwrap();
        assert!((x[0] + x[1] - 2.0).abs() < 1e-3);
    }
}
