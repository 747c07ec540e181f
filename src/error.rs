use crate::data::Pollutant;

pub type Result<T> = std::result::Result<T, ForecastError>;

pub const MSG_NO_DATA: &str = "No data for this location.";
pub const MSG_RETRY: &str = "Temporarily unable to generate a forecast, please retry.";
pub const MSG_UNKNOWN_LOCATION: &str = "Location not recognized, try a nearby major city.";

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("No usable data for location '{location}': {reason}")]
    DataUnavailable { location: String, reason: String },

    #[error("Pollutant {pollutant} has no valid observations in the window; cannot impute")]
    ImputationImpossible { pollutant: Pollutant },

    #[error("Models for location '{location}' are not ready: {source}")]
    ModelNotReady {
        location: String,
        #[source]
        source: Box<ForecastError>,
    },

    #[error("Raw {pollutant} forecast {value} is outside the plausible range")]
    ForecastOutOfRange { pollutant: Pollutant, value: f64 },

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Data source timed out after {seconds}s for location '{location}'")]
    FetchTimeout { location: String, seconds: u64 },

    #[error("Data source error: {0}")]
    FetchFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid time series frame: {0}")]
    InvalidFrame(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Model persistence error: {0}")]
    Persistence(String),

    #[error("Model has not been trained")]
    NotFitted,

    #[error("Worker task failed: {0}")]
    WorkerFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ForecastError {
    pub fn data_unavailable<L: Into<String>, R: Into<String>>(location: L, reason: R) -> Self {
        ForecastError::DataUnavailable {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn model_not_ready<L: Into<String>>(location: L, source: ForecastError) -> Self {
        ForecastError::ModelNotReady {
            location: location.into(),
            source: Box::new(source),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        ForecastError::InvalidParameter(msg.into())
    }

    pub fn invalid_frame<S: Into<String>>(msg: S) -> Self {
        ForecastError::InvalidFrame(msg.into())
    }

    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        ForecastError::Numerical(msg.into())
    }

    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        ForecastError::Persistence(msg.into())
    }

    pub fn fetch_failed<S: Into<String>>(msg: S) -> Self {
        ForecastError::FetchFailed(msg.into())
    }

    /// Whether the same request may succeed if simply repeated later.
    pub fn is_retriable(&self) -> bool {
        match self {
            ForecastError::FetchTimeout { .. }
            | ForecastError::FetchFailed(_)
            | ForecastError::WorkerFailed(_)
            | ForecastError::Io(_) => true,
            ForecastError::ModelNotReady { source, .. } => source.is_retriable(),
            _ => false,
        }
    }

    /// The short actionable message shown to end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            ForecastError::DataUnavailable { .. } | ForecastError::ImputationImpossible { .. } => {
                MSG_NO_DATA
            }
            ForecastError::LocationNotFound(_) => MSG_UNKNOWN_LOCATION,
            ForecastError::ModelNotReady { source, .. } => match source.as_ref() {
                ForecastError::DataUnavailable { .. }
                | ForecastError::ImputationImpossible { .. }
                | ForecastError::LocationNotFound(_) => source.user_message(),
                _ => MSG_RETRY,
            },
            _ => MSG_RETRY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_collapse_to_three() {
        let no_data = ForecastError::data_unavailable("delhi", "empty history");
        assert_eq!(no_data.user_message(), MSG_NO_DATA);

        let impossible = ForecastError::ImputationImpossible { pollutant: Pollutant::So2 };
        assert_eq!(impossible.user_message(), MSG_NO_DATA);

        let unknown = ForecastError::LocationNotFound("Atlantis".to_string());
        assert_eq!(unknown.user_message(), MSG_UNKNOWN_LOCATION);

        let timeout = ForecastError::FetchTimeout { location: "paris".to_string(), seconds: 30 };
        assert_eq!(timeout.user_message(), MSG_RETRY);
    }

    #[test]
    fn test_model_not_ready_delegates_to_cause() {
        let wrapped = ForecastError::model_not_ready(
            "tokyo",
            ForecastError::data_unavailable("tokyo", "no rows"),
        );
        assert_eq!(wrapped.user_message(), MSG_NO_DATA);
        assert!(!wrapped.is_retriable());

        let transient = ForecastError::model_not_ready("tokyo", ForecastError::fetch_failed("503"));
        assert_eq!(transient.user_message(), MSG_RETRY);
        assert!(transient.is_retriable());
    }
}
