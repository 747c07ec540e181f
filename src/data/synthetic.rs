/// Deterministic synthetic air-quality source
///
/// Generates hourly series with a diurnal cycle, a weekday uplift for
/// traffic pollutants, Gaussian noise and randomly dropped readings. Every
/// (location, hour, pollutant) cell is derived from its own seed, so
/// overlapping windows agree cell for cell.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64;
use std::f64::consts::PI;

use crate::data::frame::floor_to_hour;
use crate::data::{AirQualitySource, Location, Pollutant, TimeSeriesFrame};
use crate::error::{ForecastError, Result};

const SEARCH_LIMIT: usize = 10;

/// Shape of one pollutant's synthetic signal
#[derive(Debug, Clone, Copy)]
struct SignalShape {
    base: f64,
    amplitude: f64,
    phase_hours: f64,
    weekday_uplift: f64,
    noise_std: f64,
    floor: f64,
}

fn shape(pollutant: Pollutant) -> SignalShape {
    match pollutant {
        Pollutant::Pm25 => SignalShape { base: 30.0, amplitude: 15.0, phase_hours: 0.0, weekday_uplift: 5.0, noise_std: 5.0, floor: 5.0 },
        Pollutant::Pm10 => SignalShape { base: 50.0, amplitude: 20.0, phase_hours: 0.0, weekday_uplift: 8.0, noise_std: 8.0, floor: 10.0 },
        Pollutant::O3 => SignalShape { base: 0.04, amplitude: 0.02, phase_hours: 6.0, weekday_uplift: 0.0, noise_std: 0.005, floor: 0.01 },
        Pollutant::No2 => SignalShape { base: 40.0, amplitude: 20.0, phase_hours: 0.0, weekday_uplift: 10.0, noise_std: 8.0, floor: 5.0 },
        Pollutant::So2 => SignalShape { base: 20.0, amplitude: 10.0, phase_hours: 0.0, weekday_uplift: 0.0, noise_std: 5.0, floor: 2.0 },
        Pollutant::Co => SignalShape { base: 2.5, amplitude: 1.5, phase_hours: 0.0, weekday_uplift: 0.5, noise_std: 0.3, floor: 0.3 },
    }
}

/// Synthetic data source over a fixed list of major cities
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    anchor: DateTime<Utc>,
    missing_rate: f64,
    seed: u64,
    cities: Vec<Location>,
}

impl SyntheticSource {
    /// Source whose "now" is the given instant (floored to the hour).
    pub fn new(anchor: DateTime<Utc>) -> Self {
        let anchor = floor_to_hour(anchor).unwrap_or(anchor);
        Self {
            anchor,
            missing_rate: 0.07,
            seed: 42,
            cities: major_cities(),
        }
    }

    /// Source anchored at the current hour.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn with_missing_rate(mut self, rate: f64) -> Self {
        self.missing_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    pub fn cities(&self) -> &[Location] {
        &self.cities
    }

    fn location_seed(&self, location: &Location) -> u64 {
        fnv1a(location.id.as_bytes()) ^ self.seed
    }

    /// Value of one cell, `None` when the cell is dropped as missing.
    fn cell(
        &self,
        location_seed: u64,
        ts: DateTime<Utc>,
        pollutant: Pollutant,
        noise: &Normal<f64>,
        allow_missing: bool,
    ) -> Option<f64> {
        let hour_index = ts.timestamp() / 3600;
        let cell_seed = location_seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(hour_index as u64)
            .wrapping_mul(31)
            .wrapping_add(pollutant.index() as u64);
        let mut rng = Pcg64::seed_from_u64(cell_seed);

        let dropped = rng.gen::<f64>() < self.missing_rate;
        if allow_missing && dropped {
            return None;
        }

        let s = shape(pollutant);
        let level = 0.6 + (location_seed % 1000) as f64 / 1000.0;
        let hour = ts.hour() as f64;
        let weekday = ts.weekday().num_days_from_monday() < 5;

        let mut value = s.base + s.amplitude * (2.0 * PI * (hour - s.phase_hours) / 24.0).sin();
        if weekday {
            value += s.weekday_uplift;
        }
        value = value * level + noise.sample(&mut rng);
        Some(value.max(s.floor))
    }

    fn build_frame(&self, location: &Location, start: DateTime<Utc>, rows: usize, allow_missing: bool) -> Result<TimeSeriesFrame> {
        let seed = self.location_seed(location);
        let mut noise = Vec::with_capacity(Pollutant::COUNT);
        for pollutant in Pollutant::ALL {
            let normal = Normal::new(0.0, shape(pollutant).noise_std).map_err(|e| {
                ForecastError::invalid_parameter(format!("{} noise distribution: {}", pollutant, e))
            })?;
            noise.push(normal);
        }

        let mut frame = TimeSeriesFrame::new(location.id.clone());
        for i in 0..rows {
            let ts = start + Duration::hours(i as i64);
            let mut row = [None; Pollutant::COUNT];
            for pollutant in Pollutant::ALL {
                row[pollutant.index()] = self.cell(seed, ts, pollutant, &noise[pollutant.index()], allow_missing);
            }
            frame.push_row(ts, row)?;
        }
        Ok(frame)
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::now()
    }
}

#[async_trait]
impl AirQualitySource for SyntheticSource {
    async fn historical_series(&self, location: &Location, days_back: u32) -> Result<TimeSeriesFrame> {
        let rows = days_back as usize * 24;
        let start = self.anchor - Duration::hours(rows as i64);
        self.build_frame(location, start, rows, true)
    }

    async fn current_readings(&self, location: &Location) -> Result<TimeSeriesFrame> {
        self.build_frame(location, self.anchor, 1, false)
    }

    async fn search_locations(&self, query: &str) -> Result<Vec<Location>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ForecastError::invalid_parameter("empty location query"));
        }
        Ok(self
            .cities
            .iter()
            .filter(|city| city.name.to_lowercase().contains(&needle))
            .take(SEARCH_LIMIT)
            .cloned()
            .collect())
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}

fn major_cities() -> Vec<Location> {
    vec![
        Location::new("New Delhi", "India", "IN").with_coordinates(28.6139, 77.2090).with_timezone("Asia/Kolkata"),
        Location::new("Los Angeles", "United States", "US").with_coordinates(34.0522, -118.2437).with_timezone("America/Los_Angeles"),
        Location::new("London", "United Kingdom", "GB").with_coordinates(51.5074, -0.1278).with_timezone("Europe/London"),
        Location::new("Beijing", "China", "CN").with_coordinates(39.9042, 116.4074).with_timezone("Asia/Shanghai"),
        Location::new("Mexico City", "Mexico", "MX").with_coordinates(19.4326, -99.1332).with_timezone("America/Mexico_City"),
        Location::new("São Paulo", "Brazil", "BR").with_coordinates(-23.5505, -46.6333).with_timezone("America/Sao_Paulo"),
        Location::new("Tokyo", "Japan", "JP").with_coordinates(35.6762, 139.6503).with_timezone("Asia/Tokyo"),
        Location::new("Paris", "France", "FR").with_coordinates(48.8566, 2.3522).with_timezone("Europe/Paris"),
        Location::new("Mumbai", "India", "IN").with_coordinates(19.0760, 72.8777).with_timezone("Asia/Kolkata"),
        Location::new("Bangkok", "Thailand", "TH").with_coordinates(13.7563, 100.5018).with_timezone("Asia/Bangkok"),
    ]
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> SyntheticSource {
        SyntheticSource::new(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring() {
        let src = source();
        let hits = src.search_locations("PAR").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Paris");

        let hits = src.search_locations("o").await.unwrap();
        assert!(hits.iter().any(|l| l.name == "London"));
        assert!(hits.iter().any(|l| l.name == "Tokyo"));

        assert!(src.search_locations("Atlantis").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_hourly_and_ends_before_anchor() {
        let src = source();
        let city = src.cities()[0].clone();
        let frame = src.historical_series(&city, 3).await.unwrap();

        assert_eq!(frame.len(), 72);
        assert_eq!(frame.end(), Some(src.anchor() - Duration::hours(1)));
        for p in Pollutant::ALL {
            assert!(frame.observed_count(p) > 0);
            assert!(frame.column(p).iter().flatten().all(|v| *v >= 0.0));
        }
    }

    #[tokio::test]
    async fn test_overlapping_windows_agree() {
        let src = source();
        let city = src.cities()[2].clone();
        let long = src.historical_series(&city, 5).await.unwrap();
        let short = src.historical_series(&city, 2).await.unwrap();

        let offset = long.len() - short.len();
        for p in Pollutant::ALL {
            assert_eq!(&long.column(p)[offset..], short.column(p));
        }
    }

    #[tokio::test]
    async fn test_noise_follows_seed() {
        let city = source().cities()[3].clone();
        let a = source().with_missing_rate(0.0).historical_series(&city, 4).await.unwrap();
        let b = source().with_missing_rate(0.0).historical_series(&city, 4).await.unwrap();
        let c = source().with_missing_rate(0.0).with_seed(7).historical_series(&city, 4).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a.column(Pollutant::No2), c.column(Pollutant::No2));

        // same hour on consecutive weekdays differs only by noise
        let pm25 = a.column(Pollutant::Pm25);
        let spread: Vec<f64> = (0..3).map(|d| pm25[d * 24 + 10].unwrap()).collect();
        assert!(spread.windows(2).any(|w| (w[0] - w[1]).abs() > 1e-9));
    }

    #[tokio::test]
    async fn test_missing_rate_is_applied() {
        let src = source().with_missing_rate(0.5);
        let city = src.cities()[1].clone();
        let frame = src.historical_series(&city, 10).await.unwrap();
        let missing = frame.missing_count(Pollutant::Pm25) as f64 / frame.len() as f64;
        assert!(missing > 0.3 && missing < 0.7, "missing share {}", missing);

        let current = src.current_readings(&city).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current.start(), Some(src.anchor()));
        assert!(Pollutant::ALL.iter().all(|p| current.value(*p, 0).is_some()));
    }
}
