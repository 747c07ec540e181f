use chrono::{Duration as ChronoDuration, Utc};
use indexmap::IndexMap;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::aqi::{compute_aqi_at, pollutant_sub_index};
use crate::config::PipelineConfig;
use crate::data::{resolve_location, AirQualitySource, Location, Pollutant, TimeSeriesFrame};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureEngine, MAX_LOOKBACK};
use crate::forecast::{ForecastPoint, PollutantForecaster, TrainingMetrics};
use crate::imputation::{validate_frame, KnnImputer};
use crate::pipeline::persistence::ModelStore;
use crate::pipeline::registry::{ModelRegistry, ModelSet, ModelState};
use crate::pipeline::result::{CurrentConcentration, HourlyForecast, PredictionResult, TrainingReport};

/// Sequences imputation, forecasting and AQI derivation for any number of
/// locations.
///
/// Fetches are the only awaits; everything CPU-bound runs on a dedicated
/// rayon pool behind `spawn_blocking`.
pub struct ForecastPipeline {
    source: Arc<dyn AirQualitySource>,
    config: PipelineConfig,
    registry: Arc<ModelRegistry>,
    store: ModelStore,
    pool: Arc<rayon::ThreadPool>,
}

impl ForecastPipeline {
    pub fn new(source: Arc<dyn AirQualitySource>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.training_workers)
            .thread_name(|i| format!("aqi-worker-{}", i))
            .build()
            .map_err(|e| ForecastError::WorkerFailed(e.to_string()))?;
        let store = ModelStore::new(config.model_dir.clone());
        Ok(Self {
            source,
            config,
            registry: Arc::new(ModelRegistry::new()),
            store,
            pool: Arc::new(pool),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn source(&self) -> &dyn AirQualitySource {
        self.source.as_ref()
    }

    pub fn state(&self, location: &Location) -> ModelState {
        self.registry.state(&location.id)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Location>> {
        self.fetch(query, self.source.search_locations(query)).await
    }

    pub async fn resolve(&self, query: &str) -> Result<Location> {
        self.fetch(query, resolve_location(self.source.as_ref(), query)).await
    }

    /// Fetch history, impute, fit all six forecasters and persist them.
    ///
    /// On failure the location keeps whatever set it had before.
    pub async fn train(&self, location: &Location) -> Result<TrainingReport> {
        let lock = self.registry.training_lock(&location.id);
        let _guard = lock.lock().await;
        self.train_locked(location).await
    }

    /// Restore the persisted model set without retraining. A partial or
    /// unreadable set counts as absent.
    pub async fn load_models(&self, location: &Location) -> bool {
        let lock = self.registry.training_lock(&location.id);
        let _guard = lock.lock().await;
        self.load_locked(location).await
    }

    /// Forecast up to `hours_ahead` hours for a location, loading or training
    /// its models first when needed.
    pub async fn predict(&self, location: &Location, hours_ahead: usize) -> Result<PredictionResult> {
        if hours_ahead == 0 {
            return Err(ForecastError::invalid_parameter("hours_ahead must be at least 1"));
        }
        let horizon = if hours_ahead > self.config.max_horizon {
            warn!(
                "Requested {}h forecast for '{}' capped at {}h",
                hours_ahead, location.id, self.config.max_horizon
            );
            self.config.max_horizon
        } else {
            hours_ahead
        };

        let set = self.ensure_ready(location).await?;

        let (context, current) = tokio::try_join!(
            self.fetch(&location.id, self.source.historical_series(location, self.config.context_days)),
            self.fetch(&location.id, self.source.current_readings(location)),
        )?;
        let frame = append_current(context, &current)?;
        if frame.is_empty() || frame.total_observed() == 0 {
            return Err(ForecastError::data_unavailable(&location.id, "no recent readings"));
        }

        let location = location.clone();
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.install(|| forecast_with(&set, location, &frame, horizon)))
            .await
            .map_err(|e| ForecastError::WorkerFailed(e.to_string()))?
    }

    /// Search for `query` and predict for the best match.
    pub async fn predict_query(&self, query: &str, hours_ahead: usize) -> Result<PredictionResult> {
        let location = self.resolve(query).await?;
        self.predict(&location, hours_ahead).await
    }

    async fn ensure_ready(&self, location: &Location) -> Result<Arc<ModelSet>> {
        if let Some(set) = self.registry.models(&location.id) {
            return Ok(set);
        }

        let lock = self.registry.training_lock(&location.id);
        let _guard = lock.lock().await;
        // another request may have finished while we waited
        if let Some(set) = self.registry.models(&location.id) {
            return Ok(set);
        }

        if !self.load_locked(location).await {
            info!("No usable persisted models for '{}', training now", location.id);
            if let Err(e) = self.train_locked(location).await {
                return Err(ForecastError::model_not_ready(&location.id, e));
            }
        }
        self.registry
            .models(&location.id)
            .ok_or_else(|| ForecastError::model_not_ready(&location.id, ForecastError::NotFitted))
    }

    async fn load_locked(&self, location: &Location) -> bool {
        let store = self.store.clone();
        let config = self.config.clone();
        let id = location.id.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load(&id, config.model_kind, &config))
            .await
            .map_err(|e| ForecastError::WorkerFailed(e.to_string()));

        match loaded {
            Ok(Ok(Some(set))) => {
                self.registry.install(Arc::new(set));
                true
            }
            Ok(Ok(None)) => false,
            Ok(Err(e)) | Err(e) => {
                warn!("Could not load models for '{}': {}", location.id, e);
                false
            }
        }
    }

    async fn train_locked(&self, location: &Location) -> Result<TrainingReport> {
        self.registry.begin_training(&location.id);
        info!(
            "Training {} models for '{}' from {} days of {} data",
            self.config.model_kind,
            location.id,
            self.config.history_days,
            self.source.source_name()
        );

        match self.run_training(location).await {
            Ok((set, report)) => {
                self.registry.install(Arc::new(set));
                info!(
                    "Training for '{}' finished in {} ms ({} rows, {} cells imputed)",
                    location.id,
                    report.duration_ms,
                    report.training_samples,
                    report.total_imputed()
                );
                Ok(report)
            }
            Err(e) => {
                self.registry.fail_training(&location.id, &e);
                Err(e)
            }
        }
    }

    async fn run_training(&self, location: &Location) -> Result<(ModelSet, TrainingReport)> {
        let started = Instant::now();
        let history = self
            .fetch(&location.id, self.source.historical_series(location, self.config.history_days))
            .await?;
        if history.is_empty() || history.total_observed() == 0 {
            return Err(ForecastError::data_unavailable(&location.id, "historical window is empty"));
        }

        let config = self.config.clone();
        let store = self.store.clone();
        let pool = self.pool.clone();
        let location = location.clone();
        tokio::task::spawn_blocking(move || -> Result<(ModelSet, TrainingReport)> {
            let (set, mut report) = pool.install(|| fit_model_set(&location, &history, &config))?;
            store.save(&set)?;
            report.duration_ms = started.elapsed().as_millis() as u64;
            Ok((set, report))
        })
        .await
        .map_err(|e| ForecastError::WorkerFailed(e.to_string()))?
    }

    async fn fetch<T, F>(&self, what: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let seconds = self.config.fetch_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(seconds), future).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} fetch for '{}' timed out after {}s", self.source.source_name(), what, seconds);
                Err(ForecastError::FetchTimeout { location: what.to_string(), seconds })
            }
        }
    }
}

/// Impute the history and fit every pollutant's forecaster in parallel.
fn fit_model_set(location: &Location, history: &TimeSeriesFrame, config: &PipelineConfig) -> Result<(ModelSet, TrainingReport)> {
    let generation = Utc::now();

    let quality_before = validate_frame(history);
    quality_before.log_summary("before imputation");

    let mut imputer = KnnImputer::new(config.knn_neighbors)?;
    imputer.fit(history)?;
    let (filled, imputation) = imputer.transform_with_stats(history)?;

    let quality_after = validate_frame(&filled);
    quality_after.log_summary("after imputation");
    if quality_after.total_missing() > 0 {
        return Err(ForecastError::numerical(format!(
            "{} cells still missing after imputation",
            quality_after.total_missing()
        )));
    }

    let features = FeatureEngine::new().build_features(&filled);
    debug!("Built {} feature rows for '{}'", features.len(), location.id);

    let fitted: Vec<(PollutantForecaster, TrainingMetrics)> = Pollutant::ALL
        .par_iter()
        .map(|pollutant| -> Result<(PollutantForecaster, TrainingMetrics)> {
            let mut forecaster = PollutantForecaster::new(*pollutant, config);
            let metrics = forecaster.fit_features(&features, filled.column(*pollutant))?;
            Ok((forecaster, metrics))
        })
        .collect::<Result<Vec<_>>>()?;

    let metrics: IndexMap<Pollutant, TrainingMetrics> =
        fitted.iter().map(|(f, m)| (f.pollutant(), m.clone())).collect();
    let set = ModelSet::new(
        location.id.clone(),
        generation,
        imputer,
        fitted.into_iter().map(|(f, _)| f),
    )?;

    let report = TrainingReport {
        location: location.clone(),
        model_kind: set.kind(),
        generation,
        training_samples: history.len(),
        metrics,
        quality_before,
        quality_after,
        imputation,
        duration_ms: 0,
    };
    Ok((set, report))
}

/// Impute the recent frame, forecast each pollutant and derive the AQI of
/// the current hour and of every forecast hour.
fn forecast_with(set: &ModelSet, location: Location, frame: &TimeSeriesFrame, horizon: usize) -> Result<PredictionResult> {
    let generated_at = Utc::now();
    let (filled, _) = set.imputer().transform_with_stats(frame)?;
    let last = filled.len() - 1;
    let current_timestamp = filled
        .end()
        .ok_or_else(|| ForecastError::data_unavailable(&location.id, "no recent readings"))?;

    let mut current_values: IndexMap<Pollutant, f64> = IndexMap::with_capacity(Pollutant::COUNT);
    let mut current_concentrations = IndexMap::with_capacity(Pollutant::COUNT);
    for pollutant in Pollutant::ALL {
        if let Some(value) = filled.value(pollutant, last) {
            current_values.insert(pollutant, value);
            current_concentrations.insert(
                pollutant,
                CurrentConcentration {
                    value,
                    unit: pollutant.unit().to_string(),
                    sub_index: pollutant_sub_index(pollutant, value),
                    observed: frame.value(pollutant, last).is_some(),
                },
            );
        }
    }
    let current = compute_aqi_at(&current_values, generated_at)?;

    let series: Vec<(Pollutant, Vec<ForecastPoint>)> = Pollutant::ALL
        .par_iter()
        .map(|pollutant| -> Result<(Pollutant, Vec<ForecastPoint>)> {
            let forecaster = set.forecaster(*pollutant).ok_or_else(|| {
                ForecastError::model_not_ready(set.location(), ForecastError::NotFitted)
            })?;
            Ok((*pollutant, forecaster.predict(&filled, horizon)?))
        })
        .collect::<Result<Vec<_>>>()?;
    let pollutant_forecasts: IndexMap<Pollutant, Vec<ForecastPoint>> = series.into_iter().collect();

    let steps = pollutant_forecasts.values().map(Vec::len).min().unwrap_or(0);
    let mut forecast = Vec::with_capacity(steps);
    for step in 0..steps {
        let concentrations: IndexMap<Pollutant, f64> = pollutant_forecasts
            .iter()
            .map(|(p, points)| (*p, points[step].value))
            .collect();
        let aqi = compute_aqi_at(&concentrations, generated_at)?;
        forecast.push(HourlyForecast {
            hours_ahead: step + 1,
            timestamp: current_timestamp + ChronoDuration::hours(step as i64 + 1),
            concentrations,
            aqi,
        });
    }

    info!(
        "Forecast for '{}': current AQI {} ({}), {} hours ahead",
        location.id, current.aqi, current.category, forecast.len()
    );
    Ok(PredictionResult {
        location,
        generated_at,
        model_kind: set.kind(),
        model_generation: set.generation(),
        current,
        current_timestamp,
        current_concentrations,
        forecast,
        pollutant_forecasts,
    })
}

/// Extend the recent context with the single-row current readings.
///
/// A current row at the context's last hour overrides that row wherever the
/// current reading is observed, leaving the other cells untouched. A row a
/// little past the end is appended after missing filler rows. Anything else
/// is ignored.
pub fn append_current(mut context: TimeSeriesFrame, current: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
    let Some(ts) = current.start() else {
        return Ok(context);
    };
    let row = current.row(0);
    let Some(end) = context.end() else {
        let mut frame = TimeSeriesFrame::new(context.location().to_string());
        frame.push_row(ts, row)?;
        return Ok(frame);
    };

    if ts == end {
        let last = context.len() - 1;
        for pollutant in Pollutant::ALL {
            if let Some(v) = row[pollutant.index()] {
                context.set_value(pollutant, last, Some(v))?;
            }
        }
    } else if ts > end && ts <= end + ChronoDuration::hours(MAX_LOOKBACK as i64) {
        let mut next = end + ChronoDuration::hours(1);
        while next < ts {
            context.push_row(next, [None; Pollutant::COUNT])?;
            next += ChronoDuration::hours(1);
        }
        context.push_row(ts, row)?;
    } else {
        debug!("Ignoring current readings at {} for frame ending {}", ts, end);
    }
    Ok(context)
}
