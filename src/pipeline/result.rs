use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::aqi::AqiResult;
use crate::data::{Location, Pollutant};
use crate::forecast::{ForecastPoint, TrainingMetrics};
use crate::imputation::{ImputationReport, ImputationStats};
use crate::models::ModelKind;

/// Latest concentration of one pollutant as shown to users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConcentration {
    pub value: f64,
    pub unit: String,
    pub sub_index: u16,
    /// `false` when the value was filled in by the imputer
    pub observed: bool,
}

/// Simultaneous forecast of all pollutants for one future hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub hours_ahead: usize,
    pub timestamp: DateTime<Utc>,
    pub concentrations: IndexMap<Pollutant, f64>,
    pub aqi: AqiResult,
}

/// Everything a consumer needs to present one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub location: Location,
    pub generated_at: DateTime<Utc>,
    pub model_kind: ModelKind,
    /// Training run of the model set that produced the forecast
    pub model_generation: DateTime<Utc>,
    /// Hour-0 index from the latest readings
    pub current: AqiResult,
    pub current_timestamp: DateTime<Utc>,
    pub current_concentrations: IndexMap<Pollutant, CurrentConcentration>,
    /// Ordered by `hours_ahead`, starting at 1
    pub forecast: Vec<HourlyForecast>,
    pub pollutant_forecasts: IndexMap<Pollutant, Vec<ForecastPoint>>,
}

impl PredictionResult {
    pub fn headline(&self) -> &AqiResult {
        &self.current
    }

    pub fn horizon(&self) -> usize {
        self.forecast.len()
    }

    /// The forecast hour with the highest AQI, earliest first on ties.
    pub fn peak(&self) -> Option<&HourlyForecast> {
        self.forecast
            .iter()
            .reduce(|best, h| if h.aqi.aqi > best.aqi.aqi { h } else { best })
    }
}

/// Outcome of one training run for a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub location: Location,
    pub model_kind: ModelKind,
    pub generation: DateTime<Utc>,
    /// Hourly rows in the historical window
    pub training_samples: usize,
    pub metrics: IndexMap<Pollutant, TrainingMetrics>,
    pub quality_before: ImputationReport,
    pub quality_after: ImputationReport,
    pub imputation: Vec<ImputationStats>,
    pub duration_ms: u64,
}

impl TrainingReport {
    pub fn total_imputed(&self) -> usize {
        self.imputation.iter().map(|s| s.imputed).sum()
    }
}
