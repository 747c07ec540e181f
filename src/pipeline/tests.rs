use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::aqi::AqiCategory;
use crate::config::PipelineConfig;
use crate::data::{AirQualitySource, Location, Pollutant, SyntheticSource, TimeSeriesFrame};
use crate::error::{ForecastError, Result, MSG_NO_DATA};
use crate::features::schema::{lag_index, roll_mean_index, roll_std_index};
use crate::features::{FeatureEngine, LAGS, WINDOWS};
use crate::models::{ForestParams, ModelKind};
use crate::pipeline::{ForecastPipeline, ModelState, PredictionResult};

fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

fn synthetic() -> SyntheticSource {
    SyntheticSource::new(anchor())
}

fn small_config(dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default().with_model_dir(dir.path());
    config.history_days = 10;
    config.context_days = 3;
    config.cv_folds = 3;
    config.training_workers = 2;
    config.fetch_timeout_secs = 5;
    config.model_params.forest = ForestParams { n_trees: 10, max_depth: 6, ..ForestParams::default() };
    config
}

fn pipeline<S: AirQualitySource + 'static>(source: S, config: PipelineConfig) -> ForecastPipeline {
    ForecastPipeline::new(Arc::new(source), config).unwrap()
}

fn london() -> Location {
    Location::new("London", "United Kingdom", "GB")
}

fn forecast_values(result: &PredictionResult) -> Vec<Vec<f64>> {
    result
        .forecast
        .iter()
        .map(|h| h.concentrations.values().copied().collect())
        .collect()
}

/// Source with no data at all
struct EmptySource;

#[async_trait]
impl AirQualitySource for EmptySource {
    async fn historical_series(&self, location: &Location, _days_back: u32) -> Result<TimeSeriesFrame> {
        Ok(TimeSeriesFrame::new(location.id.clone()))
    }

    async fn current_readings(&self, location: &Location) -> Result<TimeSeriesFrame> {
        Ok(TimeSeriesFrame::new(location.id.clone()))
    }

    async fn search_locations(&self, _query: &str) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    fn source_name(&self) -> &str {
        "empty"
    }
}

/// Synthetic data with one pollutant never reported
struct BlankPollutantSource {
    inner: SyntheticSource,
    blank: Pollutant,
}

impl BlankPollutantSource {
    fn blank_out(&self, mut frame: TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        for i in 0..frame.len() {
            frame.set_value(self.blank, i, None)?;
        }
        Ok(frame)
    }
}

#[async_trait]
impl AirQualitySource for BlankPollutantSource {
    async fn historical_series(&self, location: &Location, days_back: u32) -> Result<TimeSeriesFrame> {
        self.blank_out(self.inner.historical_series(location, days_back).await?)
    }

    async fn current_readings(&self, location: &Location) -> Result<TimeSeriesFrame> {
        self.blank_out(self.inner.current_readings(location).await?)
    }

    async fn search_locations(&self, query: &str) -> Result<Vec<Location>> {
        self.inner.search_locations(query).await
    }

    fn source_name(&self) -> &str {
        "blank"
    }
}

/// Synthetic data whose history fetch can be switched to failing
struct FlakySource {
    inner: SyntheticSource,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl AirQualitySource for FlakySource {
    async fn historical_series(&self, location: &Location, days_back: u32) -> Result<TimeSeriesFrame> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ForecastError::fetch_failed("upstream returned 503"));
        }
        self.inner.historical_series(location, days_back).await
    }

    async fn current_readings(&self, location: &Location) -> Result<TimeSeriesFrame> {
        self.inner.current_readings(location).await
    }

    async fn search_locations(&self, query: &str) -> Result<Vec<Location>> {
        self.inner.search_locations(query).await
    }

    fn source_name(&self) -> &str {
        "flaky"
    }
}

/// Synthetic data that only ever returns the last day of history
struct SingleDaySource {
    inner: SyntheticSource,
}

#[async_trait]
impl AirQualitySource for SingleDaySource {
    async fn historical_series(&self, location: &Location, _days_back: u32) -> Result<TimeSeriesFrame> {
        self.inner.historical_series(location, 1).await
    }

    async fn current_readings(&self, location: &Location) -> Result<TimeSeriesFrame> {
        self.inner.current_readings(location).await
    }

    async fn search_locations(&self, query: &str) -> Result<Vec<Location>> {
        self.inner.search_locations(query).await
    }

    fn source_name(&self) -> &str {
        "single-day"
    }
}

/// Source that never answers in time
struct StalledSource;

#[async_trait]
impl AirQualitySource for StalledSource {
    async fn historical_series(&self, location: &Location, _days_back: u32) -> Result<TimeSeriesFrame> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(TimeSeriesFrame::new(location.id.clone()))
    }

    async fn current_readings(&self, location: &Location) -> Result<TimeSeriesFrame> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(TimeSeriesFrame::new(location.id.clone()))
    }

    async fn search_locations(&self, _query: &str) -> Result<Vec<Location>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    fn source_name(&self) -> &str {
        "stalled"
    }
}

#[tokio::test]
async fn test_train_reports_imputation_and_metrics() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(synthetic(), small_config(&dir));
    let location = pipeline.resolve("london").await.unwrap();

    let report = pipeline.train(&location).await.unwrap();

    assert_eq!(report.training_samples, 240);
    assert_eq!(report.model_kind, ModelKind::RandomForest);
    assert_eq!(report.metrics.len(), 6);
    assert!(report.quality_before.total_missing() > 0);
    assert_eq!(report.quality_after.total_missing(), 0);
    for stats in &report.imputation {
        assert_eq!(stats.imputed, report.quality_before.missing(stats.pollutant));
    }
    for metrics in report.metrics.values() {
        assert_eq!(metrics.folds.len(), 3);
        assert!(metrics.mean.is_some());
    }

    assert_eq!(pipeline.state(&location), ModelState::Ready);
    for pollutant in Pollutant::ALL {
        let path = pipeline.store().artifact_path(&location.id, pollutant, ModelKind::RandomForest);
        assert!(path.is_file(), "missing {}", path.display());
    }
}

#[tokio::test]
async fn test_predict_untrained_location_trains_first() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(synthetic(), small_config(&dir));
    let location = pipeline.resolve("tokyo").await.unwrap();
    assert_eq!(pipeline.state(&location), ModelState::Untrained);

    let result = pipeline.predict(&location, 24).await.unwrap();

    assert_eq!(pipeline.state(&location), ModelState::Ready);
    assert_eq!(result.location, location);
    assert_eq!(result.horizon(), 24);
    assert_eq!(result.current_timestamp, anchor());
    assert_eq!(result.current_concentrations.len(), 6);
    assert!(result.current_concentrations.values().all(|c| c.observed));
    assert_eq!(result.current_concentrations[&Pollutant::O3].unit, "ppm");
    assert_eq!(result.current.category, AqiCategory::from_aqi(result.current.aqi));

    for (i, hour) in result.forecast.iter().enumerate() {
        assert_eq!(hour.hours_ahead, i + 1);
        assert_eq!(hour.timestamp, anchor() + chrono::Duration::hours(i as i64 + 1));
        assert!(hour.aqi.aqi <= 500);
        assert_eq!(hour.concentrations.len(), 6);
        for (pollutant, value) in &hour.concentrations {
            assert!(*value >= 0.0 && *value <= pollutant.plausible_max());
        }
    }
    for points in result.pollutant_forecasts.values() {
        assert_eq!(points.len(), 24);
    }
    assert!(result.peak().is_some());
}

#[tokio::test]
async fn test_load_models_reproduces_prediction() {
    let dir = TempDir::new().unwrap();
    let location = london();

    let first = pipeline(synthetic(), small_config(&dir));
    first.train(&location).await.unwrap();
    let before = first.predict(&location, 12).await.unwrap();

    let second = pipeline(synthetic(), small_config(&dir));
    assert_eq!(second.state(&location), ModelState::Untrained);
    assert!(second.load_models(&location).await);
    assert_eq!(second.state(&location), ModelState::Ready);
    let after = second.predict(&location, 12).await.unwrap();

    assert_eq!(after.model_generation, before.model_generation);
    assert_eq!(after.current.aqi, before.current.aqi);
    assert_eq!(after.current_concentrations, before.current_concentrations);
    assert_eq!(forecast_values(&after), forecast_values(&before));
    let aqis = |r: &PredictionResult| r.forecast.iter().map(|h| h.aqi.aqi).collect::<Vec<_>>();
    assert_eq!(aqis(&after), aqis(&before));
}

#[tokio::test]
async fn test_partial_model_set_is_not_loaded() {
    let dir = TempDir::new().unwrap();
    let location = london();

    let first = pipeline(synthetic(), small_config(&dir));
    first.train(&location).await.unwrap();
    let removed = first.store().artifact_path(&location.id, Pollutant::Co, ModelKind::RandomForest);
    std::fs::remove_file(removed).unwrap();

    let second = pipeline(synthetic(), small_config(&dir));
    assert!(!second.load_models(&location).await);
    assert_eq!(second.state(&location), ModelState::Untrained);

    // predict falls back to a full retrain
    let result = second.predict(&location, 3).await.unwrap();
    assert_eq!(result.horizon(), 3);
    assert_eq!(second.state(&location), ModelState::Ready);
}

#[tokio::test]
async fn test_model_kind_is_part_of_the_artifact_key() {
    let dir = TempDir::new().unwrap();
    let location = london();

    let forest = pipeline(synthetic(), small_config(&dir));
    forest.train(&location).await.unwrap();

    let linear = pipeline(synthetic(), small_config(&dir).with_model_kind(ModelKind::Linear));
    assert!(!linear.load_models(&location).await);
}

#[tokio::test]
async fn test_empty_history_is_data_unavailable() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(EmptySource, small_config(&dir));
    let location = london();

    let err = pipeline.train(&location).await.unwrap_err();
    assert!(matches!(err, ForecastError::DataUnavailable { .. }));
    assert_eq!(err.user_message(), MSG_NO_DATA);
    assert_eq!(pipeline.state(&location), ModelState::Untrained);

    let err = pipeline.predict(&location, 6).await.unwrap_err();
    assert!(matches!(err, ForecastError::ModelNotReady { .. }));
    assert_eq!(err.user_message(), MSG_NO_DATA);

    let err = pipeline.resolve("london").await.unwrap_err();
    assert!(matches!(err, ForecastError::LocationNotFound(_)));
}

#[tokio::test]
async fn test_pollutant_without_observations_fails_training() {
    let dir = TempDir::new().unwrap();
    let source = BlankPollutantSource { inner: synthetic(), blank: Pollutant::So2 };
    let pipeline = pipeline(source, small_config(&dir));
    let location = london();

    let err = pipeline.train(&location).await.unwrap_err();
    assert!(matches!(err, ForecastError::ImputationImpossible { pollutant: Pollutant::So2 }));
    assert_eq!(pipeline.state(&location), ModelState::Untrained);
    assert!(!pipeline.store().location_dir(&location.id).exists());
}

#[tokio::test]
async fn test_failed_retrain_keeps_previous_models() {
    let dir = TempDir::new().unwrap();
    let failing = Arc::new(AtomicBool::new(false));
    let source = FlakySource { inner: synthetic(), failing: failing.clone() };
    let pipeline = pipeline(source, small_config(&dir));
    let location = london();

    pipeline.train(&location).await.unwrap();
    let generation = pipeline.registry().models(&location.id).unwrap().generation();

    failing.store(true, Ordering::SeqCst);
    let err = pipeline.train(&location).await.unwrap_err();
    assert!(err.is_retriable());

    assert_eq!(pipeline.state(&location), ModelState::Ready);
    let kept = pipeline.registry().models(&location.id).unwrap();
    assert_eq!(kept.generation(), generation);
    assert!(pipeline.registry().slot(&location.id).unwrap().last_error.is_some());

    // predictions only need the recent window
    failing.store(false, Ordering::SeqCst);
    let result = pipeline.predict(&location, 2).await.unwrap();
    assert_eq!(result.model_generation, generation);
}

#[tokio::test]
async fn test_stalled_fetch_times_out() {
    let dir = TempDir::new().unwrap();
    let mut config = small_config(&dir);
    config.fetch_timeout_secs = 1;
    let pipeline = pipeline(StalledSource, config);
    let location = london();

    let err = pipeline.train(&location).await.unwrap_err();
    assert!(matches!(err, ForecastError::FetchTimeout { seconds: 1, .. }));
    assert!(err.is_retriable());
    assert_eq!(pipeline.state(&location), ModelState::Untrained);

    let err = pipeline.search("paris").await.unwrap_err();
    assert!(matches!(err, ForecastError::FetchTimeout { .. }));
}

#[tokio::test]
async fn test_horizon_validation() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(synthetic(), small_config(&dir));
    let location = london();

    let err = pipeline.predict(&location, 0).await.unwrap_err();
    assert!(matches!(err, ForecastError::InvalidParameter(_)));

    let result = pipeline.predict(&location, 36).await.unwrap();
    assert_eq!(result.horizon(), 24);
}

#[tokio::test]
async fn test_locations_are_independent() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(synthetic(), small_config(&dir));
    let paris = pipeline.resolve("paris").await.unwrap();
    let mumbai = pipeline.resolve("mumbai").await.unwrap();

    let (a, b) = tokio::join!(pipeline.predict(&paris, 6), pipeline.predict(&mumbai, 6));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.location.id, paris.id);
    assert_eq!(b.location.id, mumbai.id);
    assert_eq!(pipeline.registry().locations(), vec![mumbai.id.clone(), paris.id.clone()]);
    assert!(pipeline.store().location_dir(&paris.id).is_dir());
    assert!(pipeline.store().location_dir(&mumbai.id).is_dir());
}

#[tokio::test]
async fn test_search_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(synthetic(), small_config(&dir));

    let hits = pipeline.search("MEXICO").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Mexico City");

    let err = pipeline.resolve("Atlantis").await.unwrap_err();
    assert!(matches!(err, ForecastError::LocationNotFound(_)));
}

#[tokio::test]
async fn test_train_on_minimum_history() {
    let dir = TempDir::new().unwrap();
    let source = SingleDaySource { inner: synthetic() };
    let history = source.historical_series(&london(), 90).await.unwrap();
    assert_eq!(history.len(), 24);

    // the 24h lag and rolling window never have enough history
    for row in FeatureEngine::new().build_features(&history) {
        for pollutant in Pollutant::ALL {
            assert!(!row.is_available(lag_index(pollutant, LAGS.len() - 1)));
            assert!(!row.is_available(roll_mean_index(pollutant, WINDOWS.len() - 1)));
            assert!(!row.is_available(roll_std_index(pollutant, WINDOWS.len() - 1)));
        }
    }

    let pipeline = pipeline(source, small_config(&dir));
    let location = pipeline.resolve("london").await.unwrap();
    let report = pipeline.train(&location).await.unwrap();

    assert_eq!(report.training_samples, 24);
    assert_eq!(report.metrics.len(), 6);
    assert_eq!(report.quality_after.total_missing(), 0);
    assert_eq!(pipeline.state(&location), ModelState::Ready);

    let result = pipeline.predict(&location, 24).await.unwrap();
    assert_eq!(result.forecast.len(), 24);
}
