//! Errors shared across the Powderline crates.
//!
//! Provider crates wrap [`NetworkError`] in their own enums. Each error has a
//! short `user_message` that can stand in for a missing report section.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A provider client could not be set up.
    #[error("{service}: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::Config(e) => e.user_message(),
            Self::Io(_) => "A local file could not be read or written.",
            Self::Service { .. } => "A data provider could not be initialized.",
            Self::Other(_) => "Something went wrong. Run with RUST_LOG=debug for details.",
        }
    }
}

/// Transport and HTTP status failures from an upstream API.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Nothing published at {0}")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => {
                "Could not reach the data provider. Check your connection."
            }
            Self::Timeout => "The data provider timed out. Try again shortly.",
            Self::ServerError { status: 429, .. } => {
                "The data provider is rate limiting requests. Try again shortly."
            }
            Self::ServerError { status, .. } if *status >= 500 => {
                "The data provider is having problems. Try again later."
            }
            Self::ServerError { .. } => "The data provider rejected the request.",
            Self::NotFound(_) => "No data is published for this request.",
            Self::InvalidResponse(_) => "The data provider sent data that could not be read.",
        }
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout => true,
            Self::ServerError { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::NotFound(_) | Self::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    Invalid(String),

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "The configuration has invalid values.",
            Self::Parse { .. } => "The configuration file is not valid TOML.",
        }
    }
}

/// Conversion of reqwest failures into [`NetworkError`].
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        match self.status() {
            _ if self.is_timeout() => NetworkError::Timeout,
            _ if self.is_decode() => NetworkError::InvalidResponse(self.to_string()),
            Some(status) if !self.is_connect() => NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            },
            _ => NetworkError::ConnectionFailed(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> NetworkError {
        NetworkError::ServerError {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_every_network_error_has_a_message() {
        let errors = [
            NetworkError::Timeout,
            NetworkError::ConnectionFailed("refused".into()),
            status(502),
            NetworkError::NotFound("/products/point".into()),
            NetworkError::InvalidResponse("eof".into()),
        ];
        for err in &errors {
            assert!(!err.user_message().is_empty(), "{:?}", err);
        }
    }

    #[test]
    fn test_status_specific_messages() {
        assert!(status(503).user_message().contains("having problems"));
        assert!(status(429).user_message().contains("rate limiting"));
        assert!(status(400).user_message().contains("rejected"));
    }

    #[test]
    fn test_retryability() {
        assert!(NetworkError::Timeout.is_retryable());
        assert!(NetworkError::ConnectionFailed(String::new()).is_retryable());
        assert!(status(429).is_retryable());
        assert!(status(504).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!NetworkError::NotFound("x".into()).is_retryable());
        assert!(!NetworkError::InvalidResponse("x".into()).is_retryable());
    }

    #[test]
    fn test_app_error_messages() {
        let network: AppError = NetworkError::Timeout.into();
        assert!(network.user_message().contains("timed out"));

        let config: AppError = ConfigError::Invalid("http.timeout_secs".into()).into();
        assert_eq!(
            config.to_string(),
            "Configuration validation failed: http.timeout_secs"
        );

        let service = AppError::Service {
            service: "weather",
            message: "bad TLS".into(),
        };
        assert_eq!(service.to_string(), "weather: bad TLS");

        let io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(io, AppError::Io(_)));
        assert!(io.user_message().contains("local file"));
        assert_eq!(io.to_string(), "IO error: gone");

        let other = AppError::Other("no config directory".into());
        assert_eq!(other.to_string(), "no config directory");
    }
}
