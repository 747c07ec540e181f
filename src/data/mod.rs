/// Raw observation types and the data-source capability
///
/// - `Pollutant`: the six regulated pollutants with units and plausible ranges
/// - `TimeSeriesFrame`: dense hourly table of readings for one location
/// - `AirQualitySource`: async provider of historical and current readings
/// - `SyntheticSource`: deterministic generator used by the CLI and tests

pub mod frame;
pub mod pollutant;
pub mod source;
pub mod synthetic;

pub use frame::{slugify, Location, Reading, TimeSeriesFrame};
pub use pollutant::Pollutant;
pub use source::{resolve_location, AirQualitySource};
pub use synthetic::SyntheticSource;
