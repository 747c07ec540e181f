use chrono::{Duration, Utc};
use log::{debug, info, warn};

use crate::config::{ModelParams, PipelineConfig, HORIZON_LIMIT};
use crate::data::{Pollutant, TimeSeriesFrame};
use crate::error::{ForecastError, Result};
use crate::features::{input_columns, input_names, FeatureEngine, FeatureVector};
use crate::forecast::types::{FoldMetrics, ForecastPoint, PollutantModel, TrainingMetrics};
use crate::models::{ModelKind, RegressionMetrics, RegressionModel, Regressor, StandardScaler, TimeSeriesSplit};

/// Fail if a raw model output is non-finite or far outside the physical range.
pub fn check_raw_output(pollutant: Pollutant, raw: f64) -> Result<f64> {
    let max = pollutant.plausible_max();
    if !raw.is_finite() || raw < -max || raw > 10.0 * max {
        return Err(ForecastError::ForecastOutOfRange { pollutant, value: raw });
    }
    Ok(raw)
}

/// Forecaster for one pollutant.
///
/// Training uses chronological cross-validation for evaluation and then fits
/// the final model on every row. Prediction runs one step at a time: each
/// forecast is appended to a working copy of the recent series so the next
/// step's lag and rolling features see it. Errors therefore compound with
/// the horizon.
#[derive(Debug, Clone)]
pub struct PollutantForecaster {
    pollutant: Pollutant,
    kind: ModelKind,
    params: ModelParams,
    cv_folds: usize,
    lookback: usize,
    max_horizon: usize,
    engine: FeatureEngine,
    columns: Vec<usize>,
    model: Option<PollutantModel>,
}

impl PollutantForecaster {
    pub fn new(pollutant: Pollutant, config: &PipelineConfig) -> Self {
        Self {
            pollutant,
            kind: config.model_kind,
            params: config.model_params.clone(),
            cv_folds: config.cv_folds,
            lookback: config.prediction_lookback_hours,
            max_horizon: config.max_horizon.min(HORIZON_LIMIT),
            engine: FeatureEngine::new(),
            columns: input_columns(pollutant),
            model: None,
        }
    }

    /// Wrap an already trained model, checking it matches the feature schema.
    pub fn from_model(model: PollutantModel, config: &PipelineConfig) -> Result<Self> {
        let expected = input_names(model.pollutant);
        if model.feature_names != expected {
            return Err(ForecastError::SchemaMismatch(format!(
                "{} model has {} input columns, current schema has {}",
                model.pollutant,
                model.feature_names.len(),
                expected.len()
            )));
        }
        if model.scaler.n_features() != expected.len() {
            return Err(ForecastError::SchemaMismatch(format!(
                "{} scaler width {} does not match {} inputs",
                model.pollutant,
                model.scaler.n_features(),
                expected.len()
            )));
        }
        let mut forecaster = Self::new(model.pollutant, config);
        forecaster.kind = model.kind;
        forecaster.model = Some(model);
        Ok(forecaster)
    }

    pub fn pollutant(&self) -> Pollutant {
        self.pollutant
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&PollutantModel> {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Option<PollutantModel> {
        self.model
    }

    /// Train on an imputed frame.
    pub fn fit(&mut self, frame: &TimeSeriesFrame) -> Result<TrainingMetrics> {
        let features = self.engine.build_features(frame);
        self.fit_features(&features, frame.column(self.pollutant))
    }

    /// Train on prebuilt feature vectors and the aligned target column.
    /// Rows whose target is missing are skipped.
    pub fn fit_features(&mut self, features: &[FeatureVector], target: &[Option<f64>]) -> Result<TrainingMetrics> {
        if features.len() != target.len() {
            return Err(ForecastError::invalid_parameter(format!(
                "{} feature rows but {} targets",
                features.len(),
                target.len()
            )));
        }

        let mut x: Vec<Vec<Option<f64>>> = Vec::with_capacity(features.len());
        let mut y: Vec<f64> = Vec::with_capacity(features.len());
        for (fv, t) in features.iter().zip(target.iter()) {
            if let Some(v) = t {
                x.push(fv.select(&self.columns));
                y.push(*v);
            }
        }
        if y.is_empty() {
            return Err(ForecastError::data_unavailable(
                self.pollutant.code(),
                "no observed target values to train on",
            ));
        }

        let split = TimeSeriesSplit::new(self.cv_folds)?;
        let mut folds = Vec::new();
        if y.len() >= split.min_samples() {
            for fold in split.split(y.len())? {
                let (scaler, model) = self.fit_once(&x[fold.train.clone()], &y[fold.train.clone()])?;
                let test_x = scaler.transform(&x[fold.test.clone()])?;
                let predicted = model.predict(&test_x)?;
                let m = RegressionMetrics::compute(&y[fold.test.clone()], &predicted)?;
                debug!(
                    "{} fold {}: train={} test={} rmse={:.4} mae={:.4} r2={:.4}",
                    self.pollutant,
                    fold.index,
                    fold.train.len(),
                    fold.test.len(),
                    m.rmse,
                    m.mae,
                    m.r2
                );
                folds.push(FoldMetrics {
                    fold: fold.index,
                    train_rows: fold.train.len(),
                    test_rows: fold.test.len(),
                    rmse: m.rmse,
                    mae: m.mae,
                    r2: m.r2,
                });
            }
        } else {
            warn!(
                "{}: {} rows is too few for {}-fold cross-validation, skipping evaluation",
                self.pollutant,
                y.len(),
                self.cv_folds
            );
        }

        let fold_metrics: Vec<RegressionMetrics> = folds
            .iter()
            .map(|f| RegressionMetrics { rmse: f.rmse, mae: f.mae, r2: f.r2 })
            .collect();
        let metrics = TrainingMetrics {
            pollutant: self.pollutant,
            kind: self.kind,
            training_rows: y.len(),
            folds,
            mean: RegressionMetrics::mean(&fold_metrics),
        };

        let (scaler, regressor) = self.fit_once(&x, &y)?;
        if let Some(mean) = &metrics.mean {
            info!(
                "Trained {} {} model on {} rows (cv rmse={:.4}, mae={:.4}, r2={:.4})",
                self.pollutant, self.kind, metrics.training_rows, mean.rmse, mean.mae, mean.r2
            );
        } else {
            info!("Trained {} {} model on {} rows", self.pollutant, self.kind, metrics.training_rows);
        }

        self.model = Some(PollutantModel {
            pollutant: self.pollutant,
            kind: self.kind,
            feature_names: input_names(self.pollutant),
            scaler,
            regressor,
            metrics: metrics.clone(),
            trained_at: Utc::now(),
        });
        Ok(metrics)
    }

    fn fit_once(&self, x: &[Vec<Option<f64>>], y: &[f64]) -> Result<(StandardScaler, RegressionModel)> {
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(x)?;
        let mut model = RegressionModel::new(self.kind, &self.params);
        model.fit(&scaled, y)?;
        Ok((scaler, model))
    }

    /// Forecast the next `hours_ahead` hours after the end of `recent`.
    ///
    /// `recent` should be imputed. Sibling pollutants are held at their last
    /// known value over the horizon.
    pub fn predict(&self, recent: &TimeSeriesFrame, hours_ahead: usize) -> Result<Vec<ForecastPoint>> {
        let model = self.model.as_ref().ok_or(ForecastError::NotFitted)?;
        if hours_ahead == 0 {
            return Err(ForecastError::invalid_parameter("hours_ahead must be at least 1"));
        }
        let horizon = if hours_ahead > self.max_horizon {
            warn!(
                "{}: requested {}h horizon capped at {}h",
                self.pollutant, hours_ahead, self.max_horizon
            );
            self.max_horizon
        } else {
            hours_ahead
        };
        if recent.is_empty() {
            return Err(ForecastError::data_unavailable(recent.location(), "no recent readings to forecast from"));
        }

        let mut buffer = recent.tail(self.lookback);
        let mut last_known = buffer.last_observed(self.pollutant).unwrap_or(0.0);
        let mut points = Vec::with_capacity(horizon);

        for step in 1..=horizon {
            let last_ts = buffer.end().ok_or_else(|| ForecastError::invalid_frame("empty working buffer"))?;
            let timestamp = last_ts + Duration::hours(1);

            let mut row = [None; Pollutant::COUNT];
            for sibling in Pollutant::ALL {
                if sibling != self.pollutant {
                    row[sibling.index()] = buffer.last_observed(sibling);
                }
            }
            buffer.push_row(timestamp, row)?;
            let index = buffer.len() - 1;

            let features = self.engine.build_row(&buffer, index)?;
            let scaled = model.scaler.transform_row(&features.select(&self.columns))?;
            let raw = model.regressor.predict_row(&scaled)?;

            let value = match check_raw_output(self.pollutant, raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!("{} (step {}), falling back to last known value {}", e, step, last_known);
                    last_known
                }
            };
            let clipped = self.pollutant.clip(value);

            buffer.set_value(self.pollutant, index, Some(clipped))?;
            last_known = clipped;
            points.push(ForecastPoint {
                hours_ahead: step,
                timestamp,
                pollutant: self.pollutant,
                value: clipped,
            });
        }

        Ok(points)
    }
}
