use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::data::{Pollutant, TimeSeriesFrame};
use crate::error::{ForecastError, Result};
use crate::features::temporal::{temporal_distance, temporal_features, TEMPORAL_COUNT};
use crate::imputation::quality::percent;

const ZERO_DISTANCE: f64 = 1e-12;

/// Fitted reference data for one pollutant: its observed values and their
/// timestamps over the fit window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputerColumn {
    pub pollutant: Pollutant,
    pub neighbors: usize,
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl ImputerColumn {
    pub fn from_frame(frame: &TimeSeriesFrame, pollutant: Pollutant, neighbors: usize) -> Result<Self> {
        let mut timestamps = Vec::new();
        let mut values = Vec::new();
        for (ts, value) in frame.timestamps().iter().zip(frame.column(pollutant)) {
            if let Some(v) = value {
                timestamps.push(*ts);
                values.push(*v);
            }
        }
        if values.is_empty() {
            return Err(ForecastError::ImputationImpossible { pollutant });
        }
        Ok(Self { pollutant, neighbors, timestamps, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Neighbor lookup result for one missing cell
#[derive(Debug, Clone, PartialEq)]
pub struct Imputation {
    pub value: f64,
    /// Values of the neighbors that contributed
    pub neighbor_values: Vec<f64>,
}

/// Per-pollutant outcome of one `transform` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationStats {
    pub pollutant: Pollutant,
    pub total_rows: usize,
    pub missing_before: usize,
    pub imputed: usize,
    pub imputed_percent: f64,
    /// Cells imputed from fewer than `k` neighbors
    pub fallback_cells: usize,
}

/// Distance-weighted k-nearest-neighbor imputer over the calendar signature
/// (hour, weekday, month encodings) of each row.
///
/// The pollutant being imputed never enters the distance, so an imputed
/// value only depends on when the gap is, not on other gaps.
#[derive(Debug, Clone)]
pub struct KnnImputer {
    neighbors: usize,
    columns: IndexMap<Pollutant, ImputerColumn>,
}

impl KnnImputer {
    pub fn new(neighbors: usize) -> Result<Self> {
        if neighbors == 0 {
            return Err(ForecastError::invalid_parameter("imputer needs at least one neighbor"));
        }
        Ok(Self { neighbors, columns: IndexMap::new() })
    }

    /// Restore a fitted imputer from its persisted columns.
    pub fn from_columns<I: IntoIterator<Item = ImputerColumn>>(neighbors: usize, columns: I) -> Result<Self> {
        let mut imputer = Self::new(neighbors)?;
        for column in columns {
            imputer.columns.insert(column.pollutant, column);
        }
        imputer.columns.sort_keys();
        Ok(imputer)
    }

    pub fn neighbors(&self) -> usize {
        self.neighbors
    }

    pub fn is_fitted(&self) -> bool {
        Pollutant::ALL.iter().all(|p| self.columns.contains_key(p))
    }

    pub fn column(&self, pollutant: Pollutant) -> Option<&ImputerColumn> {
        self.columns.get(&pollutant)
    }

    /// Learn the observed reference series of every pollutant.
    pub fn fit(&mut self, frame: &TimeSeriesFrame) -> Result<()> {
        if frame.is_empty() {
            return Err(ForecastError::data_unavailable(frame.location(), "empty frame"));
        }
        let mut columns = IndexMap::with_capacity(Pollutant::COUNT);
        for pollutant in Pollutant::ALL {
            columns.insert(pollutant, ImputerColumn::from_frame(frame, pollutant, self.neighbors)?);
        }
        self.columns = columns;
        debug!("Fitted kNN imputer (k={}) on {} rows of '{}'", self.neighbors, frame.len(), frame.location());
        Ok(())
    }

    pub fn transform(&self, frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        self.transform_with_stats(frame).map(|(filled, _)| filled)
    }

    pub fn fit_transform(&mut self, frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        self.fit(frame)?;
        self.transform(frame)
    }

    /// Fill every missing cell and report per-pollutant counts.
    pub fn transform_with_stats(&self, frame: &TimeSeriesFrame) -> Result<(TimeSeriesFrame, Vec<ImputationStats>)> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted);
        }

        let signatures: Vec<[f64; TEMPORAL_COUNT]> =
            frame.timestamps().iter().map(|ts| temporal_features(*ts)).collect();
        let mut filled = frame.clone();
        let mut stats = Vec::with_capacity(Pollutant::COUNT);

        for (pollutant, column) in &self.columns {
            let reference: Vec<[f64; TEMPORAL_COUNT]> =
                column.timestamps.iter().map(|ts| temporal_features(*ts)).collect();
            let missing_before = frame.missing_count(*pollutant);
            let mut imputed = 0;
            let mut fallback_cells = 0;

            for (row, cell) in frame.column(*pollutant).iter().enumerate() {
                if cell.is_some() {
                    continue;
                }
                let result = self.impute_cell(column, &reference, frame.timestamps()[row], &signatures[row])?;
                if result.neighbor_values.len() < self.neighbors {
                    fallback_cells += 1;
                }
                filled.set_value(*pollutant, row, Some(result.value))?;
                imputed += 1;
            }

            if fallback_cells > 0 {
                warn!(
                    "{}: only {} reference values for k={}, imputed {} cells from fewer neighbors",
                    pollutant,
                    column.len(),
                    self.neighbors,
                    fallback_cells
                );
            }

            let entry = ImputationStats {
                pollutant: *pollutant,
                total_rows: frame.len(),
                missing_before,
                imputed,
                imputed_percent: percent(imputed, frame.len()),
                fallback_cells,
            };
            info!(
                "[{}] imputed {} {} values ({:.2}% of {} rows)",
                frame.location(),
                entry.imputed,
                pollutant,
                entry.imputed_percent,
                entry.total_rows
            );
            stats.push(entry);
        }

        Ok((filled, stats))
    }

    /// Weighted neighbor estimate for a single missing cell.
    pub fn impute_cell(
        &self,
        column: &ImputerColumn,
        reference: &[[f64; TEMPORAL_COUNT]],
        timestamp: DateTime<Utc>,
        signature: &[f64; TEMPORAL_COUNT],
    ) -> Result<Imputation> {
        if column.is_empty() {
            return Err(ForecastError::ImputationImpossible { pollutant: column.pollutant });
        }

        let mut candidates: Vec<(f64, i64, f64)> = reference
            .iter()
            .zip(column.timestamps.iter().zip(column.values.iter()))
            .map(|(sig, (ts, value))| {
                let distance = temporal_distance(signature, sig);
                let gap = (timestamp - *ts).num_hours().abs();
                (distance, gap, *value)
            })
            .collect();

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.truncate(self.neighbors);

        let exact: Vec<f64> = candidates
            .iter()
            .filter(|(d, _, _)| *d < ZERO_DISTANCE)
            .map(|(_, _, v)| *v)
            .collect();

        let value = if !exact.is_empty() {
            exact.iter().sum::<f64>() / exact.len() as f64
        } else {
            let (weighted, total) = candidates
                .iter()
                .fold((0.0, 0.0), |(acc, w_sum), (d, _, v)| (acc + v / d, w_sum + 1.0 / d));
            weighted / total
        };

        Ok(Imputation {
            value,
            neighbor_values: candidates.into_iter().map(|(_, _, v)| v).collect(),
        })
    }
}
