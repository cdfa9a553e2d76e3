//! Road event error types.

use powderline_core::NetworkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoadError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl RoadError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::Parse(_) => "Road event data could not be read.",
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
        assert!(RoadError::Parse("x".into()).user_message().contains("Road"));
        assert!(RoadError::Network(NetworkError::Timeout).is_retryable());
        assert!(!RoadError::Parse("x".into()).is_retryable());
    }
}
