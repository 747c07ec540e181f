use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ForecastError, Result};
use crate::models::{ForestParams, LinearParams, ModelKind, PolynomialParams, SvrParams};

/// Hard ceiling on the forecast horizon in hours.
pub const HORIZON_LIMIT: usize = 24;

/// Hyperparameters of every regression strategy
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub forest: ForestParams,
    pub polynomial: PolynomialParams,
    pub svr: SvrParams,
    pub linear: LinearParams,
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Days of history fetched for training
    pub history_days: u32,
    /// Days of recent context fetched for prediction
    pub context_days: u32,
    pub max_horizon: usize,
    pub knn_neighbors: usize,
    pub cv_folds: usize,
    pub model_kind: ModelKind,
    pub model_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub training_workers: usize,
    /// Rows of the imputed context kept as the forecasting buffer
    pub prediction_lookback_hours: usize,
    pub model_params: ModelParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_days: 90,
            context_days: 7,
            max_horizon: HORIZON_LIMIT,
            knn_neighbors: 5,
            cv_folds: 5,
            model_kind: ModelKind::RandomForest,
            model_dir: PathBuf::from("data/models"),
            fetch_timeout_secs: 30,
            training_workers: num_cpus::get(),
            prediction_lookback_hours: 48,
            model_params: ModelParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_model_kind(mut self, kind: ModelKind) -> Self {
        self.model_kind = kind;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ForecastError::invalid_parameter(msg));

        if self.history_days == 0 {
            return fail("history_days must be positive".into());
        }
        if self.context_days == 0 {
            return fail("context_days must be positive".into());
        }
        if self.max_horizon == 0 || self.max_horizon > HORIZON_LIMIT {
            return fail(format!("max_horizon must be within 1..={}", HORIZON_LIMIT));
        }
        if self.knn_neighbors == 0 {
            return fail("knn_neighbors must be positive".into());
        }
        if self.cv_folds < 2 {
            return fail("cv_folds must be at least 2".into());
        }
        if self.fetch_timeout_secs == 0 {
            return fail("fetch_timeout_secs must be positive".into());
        }
        if self.training_workers == 0 {
            return fail("training_workers must be positive".into());
        }
        if self.prediction_lookback_hours < crate::features::MAX_LOOKBACK {
            return fail(format!(
                "prediction_lookback_hours must cover the {}h feature lookback",
                crate::features::MAX_LOOKBACK
            ));
        }

        let forest = &self.model_params.forest;
        if forest.n_trees == 0 || forest.max_depth == 0 {
            return fail("forest needs n_trees > 0 and max_depth > 0".into());
        }
        if forest.min_samples_leaf == 0 || forest.min_samples_split < 2 {
            return fail("forest needs min_samples_leaf >= 1 and min_samples_split >= 2".into());
        }
        if self.model_params.polynomial.alpha <= 0.0 {
            return fail("polynomial alpha must be positive".into());
        }
        let svr = &self.model_params.svr;
        if svr.c <= 0.0 || svr.epsilon < 0.0 || svr.max_iter == 0 {
            return fail("svr needs c > 0, epsilon >= 0 and max_iter > 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.history_days, 90);
        assert_eq!(config.context_days, 7);
        assert_eq!(config.model_kind, ModelKind::RandomForest);
        assert_eq!(config.model_params.forest.n_trees, 200);
        assert_eq!(config.model_params.forest.max_depth, 15);
        assert!(config.training_workers >= 1);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"model_kind": "svr", "history_days": 30, "model_params": {{"forest": {{"n_trees": 10}}}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.model_kind, ModelKind::Svr);
        assert_eq!(config.history_days, 30);
        assert_eq!(config.context_days, 7);
        assert_eq!(config.model_params.forest.n_trees, 10);
        assert_eq!(config.model_params.forest.max_depth, 15);
    }

    #[test]
    fn test_validate_rejects_nonsense() {
        let mut config = PipelineConfig::default();
        config.max_horizon = 48;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.knn_neighbors = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.model_params.forest.n_trees = 0;
        assert!(config.validate().is_err());
    }
}
