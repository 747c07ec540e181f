use crate::data::Pollutant;
use crate::features::temporal::{TEMPORAL_COUNT, TEMPORAL_NAMES};

/// Lag offsets in hours
pub const LAGS: [usize; 5] = [1, 3, 6, 12, 24];

/// Trailing rolling-window lengths in hours
pub const WINDOWS: [usize; 4] = [3, 6, 12, 24];

/// Longest history any feature needs.
pub const MAX_LOOKBACK: usize = 24;

const LAG_OFFSET: usize = TEMPORAL_COUNT;
const ROLL_OFFSET: usize = LAG_OFFSET + Pollutant::COUNT * LAGS.len();
const CURRENT_OFFSET: usize = ROLL_OFFSET + Pollutant::COUNT * WINDOWS.len() * 2;

/// Width of every feature vector.
pub const FEATURE_COUNT: usize = CURRENT_OFFSET + Pollutant::COUNT;

/// Column index of `<p>_lag_<LAGS[lag_pos]>`.
pub fn lag_index(pollutant: Pollutant, lag_pos: usize) -> usize {
    LAG_OFFSET + pollutant.index() * LAGS.len() + lag_pos
}

/// Column index of `<p>_roll_mean_<WINDOWS[window_pos]>`.
pub fn roll_mean_index(pollutant: Pollutant, window_pos: usize) -> usize {
    ROLL_OFFSET + (pollutant.index() * WINDOWS.len() + window_pos) * 2
}

/// Column index of `<p>_roll_std_<WINDOWS[window_pos]>`.
pub fn roll_std_index(pollutant: Pollutant, window_pos: usize) -> usize {
    roll_mean_index(pollutant, window_pos) + 1
}

/// Column index of `<p>_current`.
pub fn current_index(pollutant: Pollutant) -> usize {
    CURRENT_OFFSET + pollutant.index()
}

/// Column names in schema order.
pub fn feature_names() -> Vec<String> {
    let mut names: Vec<String> = TEMPORAL_NAMES.iter().map(|s| s.to_string()).collect();
    for p in Pollutant::ALL {
        for lag in LAGS {
            names.push(format!("{}_lag_{}", p.code(), lag));
        }
    }
    for p in Pollutant::ALL {
        for window in WINDOWS {
            names.push(format!("{}_roll_mean_{}", p.code(), window));
            names.push(format!("{}_roll_std_{}", p.code(), window));
        }
    }
    for p in Pollutant::ALL {
        names.push(format!("{}_current", p.code()));
    }
    names
}

/// Columns a forecaster for `target` consumes: everything except the
/// target's own current value.
pub fn input_columns(target: Pollutant) -> Vec<usize> {
    let excluded = current_index(target);
    (0..FEATURE_COUNT).filter(|i| *i != excluded).collect()
}

/// Names of `input_columns(target)`, in order.
pub fn input_names(target: Pollutant) -> Vec<String> {
    let names = feature_names();
    input_columns(target).into_iter().map(|i| names[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_width_and_names_agree() {
        let names = feature_names();
        assert_eq!(FEATURE_COUNT, 91);
        assert_eq!(names.len(), FEATURE_COUNT);
        assert_eq!(names[lag_index(Pollutant::O3, 2)], "o3_lag_6");
        assert_eq!(names[roll_mean_index(Pollutant::Co, 3)], "co_roll_mean_24");
        assert_eq!(names[roll_std_index(Pollutant::Pm10, 0)], "pm10_roll_std_3");
        assert_eq!(names[current_index(Pollutant::So2)], "so2_current");
        assert_eq!(names[FEATURE_COUNT - 1], "co_current");
    }

    #[test]
    fn test_input_columns_drop_only_the_target() {
        let cols = input_columns(Pollutant::No2);
        assert_eq!(cols.len(), FEATURE_COUNT - 1);
        assert!(!cols.contains(&current_index(Pollutant::No2)));
        assert!(cols.contains(&current_index(Pollutant::Pm25)));
        assert!(!input_names(Pollutant::No2).iter().any(|n| n == "no2_current"));
    }
}
