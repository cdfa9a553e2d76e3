pub mod config;
pub mod error;

pub use config::{
    AvalancheConfig, Config, ConfigIssue, DefaultsConfig, HttpConfig, RoadsConfig,
    TemperatureUnit, ValidationResult, WeatherConfig,
};
pub use error::{AppError, ConfigError, NetworkError, ReqwestErrorExt};

use anyhow::Result;

/// Initialize logging for the application.
///
/// `default_level` applies when `RUST_LOG` is unset. Output goes to stderr so
/// machine-readable output on stdout is not interleaved with logs.
pub fn init(default_level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("Powderline core initialized");
    Ok(())
}
