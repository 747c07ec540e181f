use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::Pollutant;
use crate::models::{ModelKind, RegressionMetrics, RegressionModel, StandardScaler};

/// One forecast value for one pollutant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub hours_ahead: usize,
    pub timestamp: DateTime<Utc>,
    pub pollutant: Pollutant,
    /// Clipped to `[0, pollutant.plausible_max()]`
    pub value: f64,
}

/// Evaluation of one cross-validation fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub fold: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

/// Cross-validation outcome of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub pollutant: Pollutant,
    pub kind: ModelKind,
    pub training_rows: usize,
    pub folds: Vec<FoldMetrics>,
    /// Averages over the folds; `None` when the set was too short for CV
    pub mean: Option<RegressionMetrics>,
}

/// A trained regressor together with the scaler fitted on its training
/// rows. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutantModel {
    pub pollutant: Pollutant,
    pub kind: ModelKind,
    /// Input column names in the order the scaler and regressor expect
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub regressor: RegressionModel,
    pub metrics: TrainingMetrics,
    pub trained_at: DateTime<Utc>,
}
