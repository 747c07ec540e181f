pub mod data;
pub mod error;
pub mod config;
pub mod features;
pub mod imputation; // Level 1
pub mod models;
pub mod forecast; // Level 2
pub mod aqi; // Level 3
pub mod pipeline;

pub use data::{AirQualitySource, Location, Pollutant, Reading, SyntheticSource, TimeSeriesFrame};
pub use error::{ForecastError, Result};
pub use config::{ModelParams, PipelineConfig};
pub use features::{FeatureEngine, FeatureVector};
pub use imputation::{ImputationReport, KnnImputer};
pub use models::{ModelKind, RegressionModel, Regressor, StandardScaler, TimeSeriesSplit};
pub use forecast::{ForecastPoint, PollutantForecaster, PollutantModel, TrainingMetrics};
pub use aqi::{compute_aqi, AqiCategory, AqiResult};
pub use pipeline::{
    ForecastPipeline, HourlyForecast, ModelRegistry, ModelSet, ModelState, ModelStore,
    PredictionResult, TrainingReport
};

pub mod prelude {
    pub use crate::data::{AirQualitySource, Location, Pollutant, SyntheticSource, TimeSeriesFrame};
    pub use crate::error::{ForecastError, Result};
    pub use crate::config::PipelineConfig;
    pub use crate::models::ModelKind;
    pub use crate::aqi::{compute_aqi, AqiCategory, AqiResult};
    pub use crate::pipeline::{ForecastPipeline, PredictionResult, TrainingReport};
}
