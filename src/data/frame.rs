use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::data::Pollutant;
use crate::error::{ForecastError, Result};

/// A monitoring location as resolved by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Stable identifier; also used as the model-registry and storage key.
    pub id: String,
    pub name: String,
    pub country: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl Location {
    pub fn new<S: Into<String>>(name: S, country: S, country_code: S) -> Self {
        let name = name.into();
        let country_code = country_code.into();
        let id = slugify(&format!("{}-{}", name, country_code));
        Self {
            id,
            name,
            country: country.into(),
            country_code,
            latitude: 0.0,
            longitude: 0.0,
            timezone: "UTC".to_string(),
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    pub fn with_timezone<S: Into<String>>(mut self, timezone: S) -> Self {
        self.timezone = timezone.into();
        self
    }
}

/// Lowercase ASCII slug safe for file names.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_dash = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// One pollutant concentration at one hour. `value` is `None` when the
/// provider had no valid observation for that slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub pollutant: Pollutant,
    pub value: Option<f64>,
}

impl Reading {
    pub fn observed(timestamp: DateTime<Utc>, pollutant: Pollutant, value: f64) -> Self {
        Self { timestamp, pollutant, value: Some(value) }
    }

    pub fn missing(timestamp: DateTime<Utc>, pollutant: Pollutant) -> Self {
        Self { timestamp, pollutant, value: None }
    }

    pub fn is_observed(&self) -> bool {
        self.value.is_some()
    }
}

/// Hourly, gap-free table of all six pollutants for one location.
///
/// Timestamps are hour-aligned and strictly increasing by exactly one hour.
/// Missing observations are `None` cells; negative or non-finite inputs are
/// stored as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesFrame {
    location: String,
    timestamps: Vec<DateTime<Utc>>,
    columns: [Vec<Option<f64>>; Pollutant::COUNT],
}

impl TimeSeriesFrame {
    pub fn new<S: Into<String>>(location: S) -> Self {
        Self {
            location: location.into(),
            timestamps: Vec::new(),
            columns: Default::default(),
        }
    }

    /// Build a dense hourly frame from loose readings. Readings are floored to
    /// the hour; slots without a reading become missing cells.
    pub fn from_readings<S, I>(location: S, readings: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = Reading>,
    {
        let mut slots: BTreeMap<DateTime<Utc>, [Option<f64>; Pollutant::COUNT]> = BTreeMap::new();
        let mut seen: BTreeSet<(DateTime<Utc>, usize)> = BTreeSet::new();

        for reading in readings {
            let hour = floor_to_hour(reading.timestamp)?;
            if !seen.insert((hour, reading.pollutant.index())) {
                return Err(ForecastError::invalid_frame(format!(
                    "duplicate {} reading at {}",
                    reading.pollutant, hour
                )));
            }
            let row = slots.entry(hour).or_insert([None; Pollutant::COUNT]);
            row[reading.pollutant.index()] = reading.value.and_then(sanitize);
        }

        let mut frame = Self::new(location);
        let (first, last) = match (slots.keys().next(), slots.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(frame),
        };

        let mut current = first;
        while current <= last {
            let row = slots.get(&current).copied().unwrap_or([None; Pollutant::COUNT]);
            frame.push_row(current, row)?;
            current += Duration::hours(1);
        }
        Ok(frame)
    }

    /// Build a frame from equally long columns starting at `start`.
    pub fn from_columns<S: Into<String>>(
        location: S,
        start: DateTime<Utc>,
        columns: [Vec<Option<f64>>; Pollutant::COUNT],
    ) -> Result<Self> {
        let start = floor_to_hour(start)?;
        let len = columns[0].len();
        if columns.iter().any(|c| c.len() != len) {
            return Err(ForecastError::invalid_frame("columns have different lengths"));
        }

        let mut frame = Self::new(location);
        for i in 0..len {
            let mut row = [None; Pollutant::COUNT];
            for (p, column) in columns.iter().enumerate() {
                row[p] = column[i];
            }
            frame.push_row(start + Duration::hours(i as i64), row)?;
        }
        Ok(frame)
    }

    /// Append one hourly row. The timestamp must be exactly one hour after the
    /// current last row.
    pub fn push_row(
        &mut self,
        timestamp: DateTime<Utc>,
        values: [Option<f64>; Pollutant::COUNT],
    ) -> Result<()> {
        if let Some(last) = self.timestamps.last() {
            if timestamp != *last + Duration::hours(1) {
                return Err(ForecastError::invalid_frame(format!(
                    "row at {} does not follow {} by one hour",
                    timestamp, last
                )));
            }
        } else if floor_to_hour(timestamp)? != timestamp {
            return Err(ForecastError::invalid_frame(format!(
                "timestamp {} is not hour-aligned",
                timestamp
            )));
        }

        self.timestamps.push(timestamp);
        for (column, value) in self.columns.iter_mut().zip(values.iter()) {
            column.push(value.and_then(sanitize));
        }
        Ok(())
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.timestamps.get(index).copied()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn column(&self, pollutant: Pollutant) -> &[Option<f64>] {
        &self.columns[pollutant.index()]
    }

    pub fn value(&self, pollutant: Pollutant, index: usize) -> Option<f64> {
        self.columns[pollutant.index()].get(index).copied().flatten()
    }

    pub fn row(&self, index: usize) -> [Option<f64>; Pollutant::COUNT] {
        let mut row = [None; Pollutant::COUNT];
        for (p, column) in self.columns.iter().enumerate() {
            row[p] = column.get(index).copied().flatten();
        }
        row
    }

    pub fn set_value(&mut self, pollutant: Pollutant, index: usize, value: Option<f64>) -> Result<()> {
        let column = &mut self.columns[pollutant.index()];
        let len = column.len();
        let cell = column.get_mut(index).ok_or_else(|| {
            ForecastError::invalid_parameter(format!("row {} out of bounds ({} rows)", index, len))
        })?;
        *cell = value.and_then(sanitize);
        Ok(())
    }

    pub fn observed_count(&self, pollutant: Pollutant) -> usize {
        self.column(pollutant).iter().filter(|v| v.is_some()).count()
    }

    pub fn missing_count(&self, pollutant: Pollutant) -> usize {
        self.len() - self.observed_count(pollutant)
    }

    pub fn total_observed(&self) -> usize {
        Pollutant::ALL.iter().map(|p| self.observed_count(*p)).sum()
    }

    /// Most recent observed value of a pollutant.
    pub fn last_observed(&self, pollutant: Pollutant) -> Option<f64> {
        self.column(pollutant).iter().rev().find_map(|v| *v)
    }

    /// The last `n` rows (or the whole frame if shorter).
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        let mut columns: [Vec<Option<f64>>; Pollutant::COUNT] = Default::default();
        for (dst, src) in columns.iter_mut().zip(self.columns.iter()) {
            *dst = src[start..].to_vec();
        }
        Self {
            location: self.location.clone(),
            timestamps: self.timestamps[start..].to_vec(),
            columns,
        }
    }

    /// Flatten back into readings, one per (timestamp, pollutant) slot.
    pub fn readings(&self) -> Vec<Reading> {
        let mut readings = Vec::with_capacity(self.len() * Pollutant::COUNT);
        for (i, ts) in self.timestamps.iter().enumerate() {
            for pollutant in Pollutant::ALL {
                readings.push(Reading {
                    timestamp: *ts,
                    pollutant,
                    value: self.value(pollutant, i),
                });
            }
        }
        readings
    }
}

pub fn floor_to_hour(ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
    ts.duration_trunc(Duration::hours(1))
        .map_err(|e| ForecastError::invalid_frame(format!("cannot align {} to the hour: {}", ts, e)))
}

fn sanitize(value: f64) -> Option<f64> {
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    #[test]
    fn test_from_readings_fills_gaps() {
        let readings = vec![
            Reading::observed(hour(0), Pollutant::Pm25, 10.0),
            Reading::observed(hour(3) + Duration::minutes(20), Pollutant::Pm25, 14.0),
            Reading::observed(hour(1), Pollutant::Co, 0.7),
        ];
        let frame = TimeSeriesFrame::from_readings("delhi-in", readings).unwrap();

        assert_eq!(frame.len(), 4);
        assert_eq!(frame.value(Pollutant::Pm25, 0), Some(10.0));
        assert_eq!(frame.value(Pollutant::Pm25, 2), None);
        assert_eq!(frame.value(Pollutant::Pm25, 3), Some(14.0));
        assert_eq!(frame.value(Pollutant::Co, 1), Some(0.7));
        assert_eq!(frame.missing_count(Pollutant::So2), 4);
    }

    #[test]
    fn test_duplicate_reading_rejected() {
        let readings = vec![
            Reading::observed(hour(0), Pollutant::O3, 0.03),
            Reading::observed(hour(0) + Duration::minutes(30), Pollutant::O3, 0.04),
        ];
        let err = TimeSeriesFrame::from_readings("x", readings).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidFrame(_)));
    }

    #[test]
    fn test_negative_values_become_missing() {
        let readings = vec![
            Reading::observed(hour(0), Pollutant::No2, -999.0),
            Reading::observed(hour(0), Pollutant::So2, f64::NAN),
        ];
        let frame = TimeSeriesFrame::from_readings("x", readings).unwrap();
        assert_eq!(frame.value(Pollutant::No2, 0), None);
        assert_eq!(frame.value(Pollutant::So2, 0), None);
    }

    #[test]
    fn test_push_row_requires_hourly_cadence() {
        let mut frame = TimeSeriesFrame::new("x");
        frame.push_row(hour(0), [Some(1.0); 6]).unwrap();
        assert!(frame.push_row(hour(2), [Some(1.0); 6]).is_err());
        assert!(frame.push_row(hour(1), [Some(1.0); 6]).is_ok());
    }

    #[test]
    fn test_tail_and_last_observed() {
        let mut frame = TimeSeriesFrame::new("x");
        for h in 0..5 {
            let v = if h == 4 { None } else { Some(h as f64) };
            frame.push_row(hour(h), [v; 6]).unwrap();
        }
        let tail = frame.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.start(), Some(hour(3)));
        assert_eq!(frame.last_observed(Pollutant::Pm10), Some(3.0));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("São Paulo-BR"), "s-o-paulo-br");
        assert_eq!(slugify("New Delhi-IN"), "new-delhi-in");
    }
}
