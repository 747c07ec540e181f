/// Level 2: per-pollutant forecasting
///
/// One `PollutantForecaster` per pollutant. Each trains its own scaler and
/// regressor with chronological cross-validation and forecasts up to 24
/// hours ahead by iterating one-hour steps over a growing working buffer.

pub mod forecaster;
pub mod types;

pub use forecaster::{check_raw_output, PollutantForecaster};
pub use types::{FoldMetrics, ForecastPoint, PollutantModel, TrainingMetrics};
