/// Data-source capability consumed by the pipeline
///
/// A source hands back raw hourly readings for a location. It may omit
/// pollutants or whole hours; the pipeline tolerates both.

use async_trait::async_trait;

use crate::data::{Location, TimeSeriesFrame};
use crate::error::{ForecastError, Result};

/// Provider of historical and current pollutant readings
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    /// Hourly series covering the last `days_back` days, ending at the most
    /// recent completed hour.
    async fn historical_series(&self, location: &Location, days_back: u32) -> Result<TimeSeriesFrame>;

    /// Latest readings as a single-row frame. Pollutants the provider has no
    /// current value for are missing cells.
    async fn current_readings(&self, location: &Location) -> Result<TimeSeriesFrame>;

    /// Candidate locations matching a free-text query, best match first.
    async fn search_locations(&self, query: &str) -> Result<Vec<Location>>;

    /// Source name for logs
    fn source_name(&self) -> &str;
}

/// Resolve a free-text query to the first candidate location.
pub async fn resolve_location(source: &dyn AirQualitySource, query: &str) -> Result<Location> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ForecastError::LocationNotFound(query.to_string()));
    }
    source
        .search_locations(trimmed)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ForecastError::LocationNotFound(trimmed.to_string()))
}
