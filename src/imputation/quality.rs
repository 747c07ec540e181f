use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};

use crate::data::{Pollutant, TimeSeriesFrame};

const IQR_MULTIPLIER: f64 = 1.5;

/// Data-quality statistics of one pollutant column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutantQuality {
    pub total_rows: usize,
    pub missing: usize,
    /// Share of missing rows in percent, rounded to two decimals
    pub missing_percent: f64,
    /// Observed values outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`
    pub outliers: usize,
}

/// Per-pollutant missing-value and outlier report for a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationReport {
    pub location: String,
    pub total_rows: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub pollutants: IndexMap<Pollutant, PollutantQuality>,
}

impl ImputationReport {
    pub fn total_missing(&self) -> usize {
        self.pollutants.values().map(|q| q.missing).sum()
    }

    pub fn missing(&self, pollutant: Pollutant) -> usize {
        self.pollutants.get(&pollutant).map(|q| q.missing).unwrap_or(0)
    }

    pub fn log_summary(&self, stage: &str) {
        for (pollutant, q) in &self.pollutants {
            info!(
                "[{}] {} {}: {} of {} missing ({:.2}%), {} outliers",
                self.location, stage, pollutant, q.missing, q.total_rows, q.missing_percent, q.outliers
            );
        }
    }
}

/// Inspect a frame's completeness and outliers.
pub fn validate_frame(frame: &TimeSeriesFrame) -> ImputationReport {
    let total_rows = frame.len();
    let pollutants = Pollutant::ALL
        .iter()
        .map(|p| {
            let missing = frame.missing_count(*p);
            let observed: Vec<f64> = frame.column(*p).iter().flatten().copied().collect();
            let quality = PollutantQuality {
                total_rows,
                missing,
                missing_percent: percent(missing, total_rows),
                outliers: count_outliers_iqr(&observed, IQR_MULTIPLIER),
            };
            (*p, quality)
        })
        .collect();

    ImputationReport {
        location: frame.location().to_string(),
        total_rows,
        start: frame.start(),
        end: frame.end(),
        pollutants,
    }
}

/// Percentage rounded to two decimals; zero for an empty denominator.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn count_outliers_iqr(values: &[f64], multiplier: f64) -> usize {
    let mut sorted: Vec<f64> = values.iter().filter(|x| x.is_finite()).copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let (q1, q3) = match (quantile(&sorted, 0.25), quantile(&sorted, 0.75)) {
        (Some(q1), Some(q3)) => (q1, q3),
        _ => return 0,
    };
    let iqr = q3 - q1;
    let lower = q1 - multiplier * iqr;
    let upper = q3 + multiplier * iqr;

    sorted.iter().filter(|x| **x < lower || **x > upper).count()
}
