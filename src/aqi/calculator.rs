use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::aqi::breakpoints::{sub_index, AQI_MAX};
use crate::aqi::category::AqiCategory;
use crate::data::Pollutant;
use crate::error::{ForecastError, Result};

/// AQI summary of one set of simultaneous concentrations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiResult {
    pub aqi: u16,
    pub category: AqiCategory,
    pub color: String,
    pub primary_pollutant: Pollutant,
    /// Rounded sub-index of every pollutant that had a value, canonical order
    pub sub_indices: IndexMap<Pollutant, u16>,
    pub recommendation: String,
    pub generated_at: DateTime<Utc>,
}

/// Rounded sub-index of one concentration, within `0..=500`.
pub fn pollutant_sub_index(pollutant: Pollutant, concentration: f64) -> u16 {
    sub_index(pollutant, concentration).round().clamp(0.0, AQI_MAX as f64) as u16
}

/// Overall AQI, category and recommendation for a set of concentrations.
pub fn compute_aqi(concentrations: &IndexMap<Pollutant, f64>) -> Result<AqiResult> {
    compute_aqi_at(concentrations, Utc::now())
}

/// `compute_aqi` with an explicit generation timestamp.
pub fn compute_aqi_at(concentrations: &IndexMap<Pollutant, f64>, generated_at: DateTime<Utc>) -> Result<AqiResult> {
    let mut sub_indices: IndexMap<Pollutant, u16> = IndexMap::with_capacity(Pollutant::COUNT);
    for pollutant in Pollutant::ALL {
        let Some(value) = concentrations.get(&pollutant) else {
            continue;
        };
        if !value.is_finite() {
            warn!("Skipping non-finite {} concentration {}", pollutant, value);
            continue;
        }
        sub_indices.insert(pollutant, pollutant_sub_index(pollutant, *value));
    }

    // max sub-index, ties resolved by health priority
    let (primary, aqi) = sub_indices
        .iter()
        .max_by(|(pa, a), (pb, b)| a.cmp(b).then(pb.priority_rank().cmp(&pa.priority_rank())))
        .map(|(p, v)| (*p, *v))
        .ok_or_else(|| ForecastError::invalid_parameter("no valid concentrations to compute an AQI from"))?;

    let category = AqiCategory::from_aqi(aqi);
    Ok(AqiResult {
        aqi,
        category,
        color: category.color().to_string(),
        primary_pollutant: primary,
        sub_indices,
        recommendation: category.recommendation(primary),
        generated_at,
    })
}
