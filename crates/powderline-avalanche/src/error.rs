//! Avalanche-specific error types.

use powderline_core::NetworkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AvalancheError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("No forecast zone nearby{}", distance_suffix(.distance_km))]
    NoZoneNearby { distance_km: Option<f64> },

    #[error("No forecast published for {0}")]
    ForecastUnavailable(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

fn distance_suffix(distance_km: &Option<f64>) -> String {
    match distance_km {
        Some(d) => format!(" (closest is {:.0} km away)", d),
        None => String::new(),
    }
}

impl AvalancheError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(e) => e.user_message().to_string(),
            Self::NoZoneNearby { .. } => {
                "This location is outside Avalanche Canada forecast regions.".to_string()
            }
            Self::ForecastUnavailable(area) => {
                format!("No avalanche forecast is currently published for {}.", area)
            }
            Self::Parse(_) => "Avalanche forecast could not be read.".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = AvalancheError::ForecastUnavailable("Sea-to-Sky".into());
        assert!(err.user_message().contains("Sea-to-Sky"));

        let err = AvalancheError::NoZoneNearby {
            distance_km: Some(212.4),
        };
        assert_eq!(err.to_string(), "No forecast zone nearby (closest is 212 km away)");
        assert!(err.user_message().contains("outside"));
    }

    #[test]
    fn test_retryable() {
        assert!(AvalancheError::Network(NetworkError::Timeout).is_retryable());
        assert!(!AvalancheError::Network(NetworkError::NotFound("x".into())).is_retryable());
        assert!(!AvalancheError::Parse("bad".into()).is_retryable());
    }
}
