use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Zero-mean, unit-variance column scaler.
///
/// Statistics are computed over the available cells only. At transform time
/// an unavailable cell maps to 0, the standardized column mean.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.means.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    pub fn fit(&mut self, rows: &[Vec<Option<f64>>]) -> Result<()> {
        let width = match rows.first() {
            Some(first) => first.len(),
            None => return Err(ForecastError::invalid_parameter("cannot fit scaler on zero rows")),
        };

        let mut sums = vec![0.0; width];
        let mut sq_sums = vec![0.0; width];
        let mut counts = vec![0usize; width];

        for row in rows {
            if row.len() != width {
                return Err(ForecastError::SchemaMismatch(format!(
                    "row has {} features, expected {}",
                    row.len(),
                    width
                )));
            }
            for (j, cell) in row.iter().enumerate() {
                if let Some(v) = cell {
                    sums[j] += v;
                    counts[j] += 1;
                }
            }
        }

        let means: Vec<f64> = sums
            .iter()
            .zip(counts.iter())
            .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
            .collect();

        for row in rows {
            for (j, cell) in row.iter().enumerate() {
                if let Some(v) = cell {
                    sq_sums[j] += (v - means[j]).powi(2);
                }
            }
        }

        // population std, constant columns keep unit scale
        let stds = sq_sums
            .iter()
            .zip(counts.iter())
            .map(|(sq, c)| {
                let std = if *c > 0 { (sq / *c as f64).sqrt() } else { 0.0 };
                if std > 1e-12 { std } else { 1.0 }
            })
            .collect();

        self.means = means;
        self.stds = stds;
        Ok(())
    }

    pub fn transform_row(&self, row: &[Option<f64>]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted);
        }
        if row.len() != self.means.len() {
            return Err(ForecastError::SchemaMismatch(format!(
                "row has {} features, scaler was fitted on {}",
                row.len(),
                self.means.len()
            )));
        }
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, cell)| match cell {
                Some(v) => (v - self.means[j]) / self.stds[j],
                None => 0.0,
            })
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<Option<f64>>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    pub fn fit_transform(&mut self, rows: &[Vec<Option<f64>>]) -> Result<Vec<Vec<f64>>> {
        self.fit(rows)?;
        self.transform(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_ignores_unavailable_cells() {
        let rows = vec![
            vec![Some(1.0), None],
            vec![Some(3.0), Some(10.0)],
            vec![None, Some(10.0)],
        ];
        let mut scaler = StandardScaler::new();
        scaler.fit(&rows).unwrap();

        assert_eq!(scaler.means(), &[2.0, 10.0]);
        assert_eq!(scaler.stds(), &[1.0, 1.0]);
        let scaled = scaler.transform(&rows).unwrap();
        assert_eq!(scaled[0], vec![-1.0, 0.0]);
        assert_eq!(scaled[2], vec![0.0, 0.0]);
    }

    #[test]
    fn test_width_mismatch_is_schema_error() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&[vec![Some(1.0), Some(2.0)]]).unwrap();
        let err = scaler.transform_row(&[Some(1.0)]).unwrap_err();
        assert!(matches!(err, ForecastError::SchemaMismatch(_)));
    }

    #[test]
    fn test_unfitted_scaler() {
        let scaler = StandardScaler::new();
        assert!(matches!(scaler.transform_row(&[Some(1.0)]), Err(ForecastError::NotFitted)));
        assert!(StandardScaler::new().fit(&[]).is_err());
    }
}
