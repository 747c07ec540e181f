/// Pipeline orchestration
///
/// `ForecastPipeline` runs the cascade for a location: history fetch, kNN
/// imputation, per-pollutant training and persistence on `train`; context
/// fetch, imputation, iterative forecasting and AQI derivation on `predict`.
/// Model sets live in a `ModelRegistry` and are swapped as a whole.

pub mod orchestrator;
pub mod persistence;
pub mod registry;
pub mod result;

#[cfg(test)]
mod tests;

pub use orchestrator::{append_current, ForecastPipeline};
pub use persistence::{ModelArtifact, ModelStore, SCHEMA_VERSION};
pub use registry::{LocationSlot, ModelRegistry, ModelSet, ModelState};
pub use result::{CurrentConcentration, HourlyForecast, PredictionResult, TrainingReport};
