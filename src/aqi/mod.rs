/// Level 3: EPA Air Quality Index
///
/// Piecewise-linear sub-indices per pollutant from the breakpoint tables,
/// the overall index as their maximum, and the health category and
/// recommendation text for the result.

pub mod breakpoints;
pub mod calculator;
pub mod category;

pub use breakpoints::{breakpoints, sub_index, Breakpoint, AQI_MAX};
pub use calculator::{compute_aqi, compute_aqi_at, pollutant_sub_index, AqiResult};
pub use category::{pollutant_advice, AqiCategory};
