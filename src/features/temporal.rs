use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

pub const TEMPORAL_COUNT: usize = 7;

pub const TEMPORAL_NAMES: [&str; TEMPORAL_COUNT] = [
    "hour_sin",
    "hour_cos",
    "dow_sin",
    "dow_cos",
    "month_sin",
    "month_cos",
    "is_weekend",
];

/// Sine/cosine pair for a value on a cycle of length `period`.
pub fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

/// Calendar features of one timestamp, in `TEMPORAL_NAMES` order.
///
/// Day of week counts from Monday = 0; months run 1..=12 on a 12 period.
pub fn temporal_features(ts: DateTime<Utc>) -> [f64; TEMPORAL_COUNT] {
    let (hour_sin, hour_cos) = cyclical(ts.hour() as f64, 24.0);
    let dow = ts.weekday().num_days_from_monday();
    let (dow_sin, dow_cos) = cyclical(dow as f64, 7.0);
    let (month_sin, month_cos) = cyclical(ts.month() as f64, 12.0);
    let is_weekend = if dow >= 5 { 1.0 } else { 0.0 };

    [hour_sin, hour_cos, dow_sin, dow_cos, month_sin, month_cos, is_weekend]
}

/// Euclidean distance between two temporal signatures.
pub fn temporal_distance(a: &[f64; TEMPORAL_COUNT], b: &[f64; TEMPORAL_COUNT]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
