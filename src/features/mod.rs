/// Feature engineering for hourly pollutant frames
///
/// Produces a 91-column schema: cyclical calendar encodings, per-pollutant
/// lags and trailing rolling statistics, and the simultaneous value of every
/// pollutant. Features that need more history than the frame holds are
/// marked unavailable instead of being zero-filled.

pub mod engine;
pub mod schema;
pub mod temporal;

pub use engine::{FeatureEngine, FeatureVector};
pub use schema::{feature_names, input_columns, input_names, FEATURE_COUNT, LAGS, MAX_LOOKBACK, WINDOWS};
pub use temporal::{cyclical, temporal_features, TEMPORAL_COUNT, TEMPORAL_NAMES};
