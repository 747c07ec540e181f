use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ForecastError;

/// The six regulated pollutants tracked by the pipeline.
///
/// Declaration order is the canonical column order used by frames, feature
/// schemas and serialized per-pollutant maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
    O3,
    No2,
    So2,
    Co,
}

impl Pollutant {
    pub const COUNT: usize = 6;

    pub const ALL: [Pollutant; Pollutant::COUNT] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::O3,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Co,
    ];

    /// Tie-break order for the primary pollutant, most health-relevant first.
    pub const PRIORITY: [Pollutant; Pollutant::COUNT] = [
        Pollutant::Pm25,
        Pollutant::O3,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Co,
    ];

    pub fn index(self) -> usize {
        match self {
            Pollutant::Pm25 => 0,
            Pollutant::Pm10 => 1,
            Pollutant::O3 => 2,
            Pollutant::No2 => 3,
            Pollutant::So2 => 4,
            Pollutant::Co => 5,
        }
    }

    pub fn priority_rank(self) -> usize {
        Pollutant::PRIORITY
            .iter()
            .position(|p| *p == self)
            .unwrap_or(Pollutant::COUNT)
    }

    /// Short machine identifier, as used by the data provider.
    pub fn code(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::O3 => "o3",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::Co => "co",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::O3 => "O3",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
            Pollutant::Co => "CO",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Pollutant::Pm25 | Pollutant::Pm10 => "µg/m³",
            Pollutant::O3 | Pollutant::Co => "ppm",
            Pollutant::No2 | Pollutant::So2 => "ppb",
        }
    }

    /// Upper bound of a physically plausible concentration (top of the AQI scale).
    pub fn plausible_max(self) -> f64 {
        match self {
            Pollutant::Pm25 => 500.4,
            Pollutant::Pm10 => 604.0,
            Pollutant::O3 => 0.604,
            Pollutant::No2 => 2049.0,
            Pollutant::So2 => 1004.0,
            Pollutant::Co => 50.4,
        }
    }

    pub fn clip(self, value: f64) -> f64 {
        value.clamp(0.0, self.plausible_max())
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Pollutant {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "pm25" => Ok(Pollutant::Pm25),
            "pm10" => Ok(Pollutant::Pm10),
            "o3" | "ozone" => Ok(Pollutant::O3),
            "no2" => Ok(Pollutant::No2),
            "so2" => Ok(Pollutant::So2),
            "co" => Ok(Pollutant::Co),
            _ => Err(ForecastError::invalid_parameter(format!("unknown pollutant '{}'", s))),
        }
    }
}
