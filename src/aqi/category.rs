use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::Pollutant;

/// Health category of an AQI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiCategory {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
}

impl AqiCategory {
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthyForSensitiveGroups,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    /// Inclusive AQI range of the band
    pub fn range(self) -> (u16, u16) {
        match self {
            AqiCategory::Good => (0, 50),
            AqiCategory::Moderate => (51, 100),
            AqiCategory::UnhealthyForSensitiveGroups => (101, 150),
            AqiCategory::Unhealthy => (151, 200),
            AqiCategory::VeryUnhealthy => (201, 300),
            AqiCategory::Hazardous => (301, 500),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            AqiCategory::Good => "#00E400",
            AqiCategory::Moderate => "#FFFF00",
            AqiCategory::UnhealthyForSensitiveGroups => "#FF7E00",
            AqiCategory::Unhealthy => "#FF0000",
            AqiCategory::VeryUnhealthy => "#8F3F97",
            AqiCategory::Hazardous => "#7E0023",
        }
    }

    pub fn base_recommendation(self) -> &'static str {
        match self {
            AqiCategory::Good => "Air quality is satisfactory. Enjoy outdoor activities!",
            AqiCategory::Moderate => {
                "Air quality is acceptable. Unusually sensitive people should consider limiting prolonged outdoor exertion."
            }
            AqiCategory::UnhealthyForSensitiveGroups => {
                "Children, elderly, and people with respiratory conditions should limit outdoor exposure."
            }
            AqiCategory::Unhealthy => {
                "Everyone should reduce prolonged outdoor exertion. Sensitive groups should avoid outdoor activities."
            }
            AqiCategory::VeryUnhealthy => {
                "Health alert! Everyone should avoid outdoor activities. Keep windows closed."
            }
            AqiCategory::Hazardous => {
                "Health emergency! Stay indoors. Use air purifiers if available. Seek medical attention if experiencing symptoms."
            }
        }
    }

    /// Whether the recommendation carries pollutant-specific advice.
    pub fn has_pollutant_advice(self) -> bool {
        matches!(
            self,
            AqiCategory::UnhealthyForSensitiveGroups | AqiCategory::Unhealthy | AqiCategory::VeryUnhealthy
        )
    }

    /// Recommendation text for this category with `primary` as the driver.
    pub fn recommendation(self, primary: Pollutant) -> String {
        let base = self.base_recommendation();
        if self.has_pollutant_advice() {
            format!("{} {}", base, pollutant_advice(primary))
        } else {
            base.to_string()
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn pollutant_advice(pollutant: Pollutant) -> &'static str {
    match pollutant {
        Pollutant::O3 => "Ozone levels are elevated. Limit outdoor activities during peak afternoon hours.",
        Pollutant::Pm25 => {
            "Fine particulate matter is elevated. Consider wearing a mask if outdoors for extended periods."
        }
        Pollutant::Pm10 => "Coarse particulate matter is elevated. Avoid dusty areas and outdoor exercise.",
        Pollutant::No2 => "Nitrogen dioxide levels are high. Avoid areas with heavy traffic.",
        Pollutant::So2 => {
            "Sulfur dioxide levels are high. People with asthma should avoid exertion near industrial sources."
        }
        Pollutant::Co => {
            "Carbon monoxide levels are high. Avoid heavy traffic and enclosed spaces with combustion sources."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(AqiCategory::from_aqi(0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(51), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(150), AqiCategory::UnhealthyForSensitiveGroups);
        assert_eq!(AqiCategory::from_aqi(201), AqiCategory::VeryUnhealthy);
        assert_eq!(AqiCategory::from_aqi(301), AqiCategory::Hazardous);
        assert_eq!(AqiCategory::from_aqi(500), AqiCategory::Hazardous);
    }

    #[test]
    fn test_ranges_cover_scale_without_gaps() {
        let mut expected_low = 0;
        for c in AqiCategory::ALL {
            let (low, high) = c.range();
            assert_eq!(low, expected_low);
            assert_eq!(AqiCategory::from_aqi(low), c);
            assert_eq!(AqiCategory::from_aqi(high), c);
            expected_low = high + 1;
        }
        assert_eq!(expected_low, 501);
    }

    #[test]
    fn test_recommendation_advice_only_for_mid_bands() {
        let good = AqiCategory::Good.recommendation(Pollutant::O3);
        assert!(!good.contains("Ozone"));

        let unhealthy = AqiCategory::Unhealthy.recommendation(Pollutant::O3);
        assert!(unhealthy.starts_with(AqiCategory::Unhealthy.base_recommendation()));
        assert!(unhealthy.contains("Ozone"));

        let hazardous = AqiCategory::Hazardous.recommendation(Pollutant::Pm25);
        assert_eq!(hazardous, AqiCategory::Hazardous.base_recommendation());
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&AqiCategory::UnhealthyForSensitiveGroups).unwrap();
        assert_eq!(json, "\"Unhealthy for Sensitive Groups\"");
    }
}
