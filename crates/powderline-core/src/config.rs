use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{AppError, ConfigError};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "POWDERLINE_CONFIG";

/// One problem found by [`Config::validate`], keyed by its TOML path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.field)
    }
}

/// Errors make a config unusable; warnings are logged and ignored.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

fn issue(field: impl Into<String>, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        field: field.into(),
        message: message.into(),
    }
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(issue(field, message));
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(issue(field, message));
    }

    /// All errors on one line.
    pub fn error_summary(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        parts.join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Open-Meteo settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Avalanche Canada settings
    #[serde(default)]
    pub avalanche: AvalancheConfig,

    /// DriveBC road event settings
    #[serde(default)]
    pub roads: RoadsConfig,

    /// Defaults for the command line
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent to every provider
    pub user_agent: String,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry
    pub initial_retry_delay_ms: u64,

    /// Upper bound for a single backoff delay
    pub max_retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: format!("powderline/{}", env!("CARGO_PKG_VERSION")),
            max_retries: 3,
            initial_retry_delay_ms: 250,
            max_retry_delay_ms: 4000,
        }
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    /// Celsius, the BC default
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Value for Open-Meteo's `temperature_unit` parameter.
    pub fn api_value(self) -> &'static str {
        match self {
            Self::Auto | Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Auto | Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }

    /// Convert a temperature expressed in this unit to Celsius.
    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            Self::Auto | Self::Celsius => value,
            Self::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub temperature_unit: TemperatureUnit,
    /// Days of forecast to request (Open-Meteo allows 1-16)
    pub forecast_days: u8,
    /// IANA timezone used for hourly/daily timestamps
    pub timezone: String,
    pub cache_ttl_minutes: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1".to_string(),
            temperature_unit: TemperatureUnit::Auto,
            forecast_days: 7,
            timezone: "America/Vancouver".to_string(),
            cache_ttl_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvalancheConfig {
    pub base_url: String,
    /// Forecast language, `en` or `fr`
    pub language: String,
    /// Points further than this from every zone centroid get no forecast
    pub max_zone_distance_km: f64,
    pub cache_ttl_minutes: u64,
}

impl Default for AvalancheConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.avalanche.ca".to_string(),
            language: "en".to_string(),
            max_zone_distance_km: 100.0,
            cache_ttl_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadsConfig {
    pub base_url: String,
    /// Events within this distance of a location are always considered
    pub radius_km: f64,
    /// Events on a location's access highways are considered up to this distance
    pub route_radius_km: f64,
    /// Keep minor events that are not closures or condition reports
    pub include_minor: bool,
    pub max_events: usize,
    pub cache_ttl_minutes: u64,
}

impl Default for RoadsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open511.gov.bc.ca".to_string(),
            radius_km: 60.0,
            route_radius_km: 150.0,
            include_minor: false,
            max_events: 10,
            cache_ttl_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Catalog id used when no location is given on the command line
    pub location: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            location: "whistler-blackcomb".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                tracing::warn!("Could not write default config to {}: {}", path.display(), e);
            }
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(AppError::from)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.message().to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation finds errors; warnings are logged.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        for (field, value) in [
            ("weather.base_url", &self.weather.base_url),
            ("avalanche.base_url", &self.avalanche.base_url),
            ("roads.base_url", &self.roads.base_url),
        ] {
            if let Err(message) = check_base_url(value) {
                result.add_error(field, message);
            }
        }

        if self.http.timeout_secs == 0 {
            result.add_error("http.timeout_secs", "Timeout must be greater than 0");
        } else if self.http.timeout_secs > 120 {
            result.add_warning("http.timeout_secs", "Timeout is unusually long (>120s)");
        }

        if self.http.max_retries > 10 {
            result.add_warning("http.max_retries", "More than 10 retries per request");
        }

        if self.http.initial_retry_delay_ms > self.http.max_retry_delay_ms {
            result.add_warning(
                "http.initial_retry_delay_ms",
                "Initial retry delay exceeds the maximum delay",
            );
        }

        if !(1..=16).contains(&self.weather.forecast_days) {
            result.add_error(
                "weather.forecast_days",
                "Forecast days must be between 1 and 16",
            );
        }

        if self.weather.timezone.trim().is_empty() {
            result.add_error("weather.timezone", "Timezone must not be empty");
        }

        if self.avalanche.language != "en" && self.avalanche.language != "fr" {
            result.add_error("avalanche.language", "Language must be \"en\" or \"fr\"");
        }

        if !is_positive(self.avalanche.max_zone_distance_km) {
            result.add_error(
                "avalanche.max_zone_distance_km",
                "Zone distance must be greater than 0",
            );
        }

        if !is_positive(self.roads.radius_km) {
            result.add_error("roads.radius_km", "Radius must be greater than 0");
        } else if self.roads.route_radius_km < self.roads.radius_km {
            result.add_warning(
                "roads.route_radius_km",
                "Route radius is smaller than the local radius and has no effect",
            );
        }

        if self.roads.max_events == 0 {
            result.add_warning("roads.max_events", "Road events disabled (0 events)");
        }

        for (field, minutes) in [
            ("weather.cache_ttl_minutes", self.weather.cache_ttl_minutes),
            ("avalanche.cache_ttl_minutes", self.avalanche.cache_ttl_minutes),
            ("roads.cache_ttl_minutes", self.roads.cache_ttl_minutes),
        ] {
            if minutes == 0 {
                result.add_warning(field, "Caching disabled (0 minutes)");
            } else if minutes > 1440 {
                result.add_warning(field, "Cache lifetime is more than 24 hours");
            }
        }

        if self.defaults.location.trim().is_empty() {
            result.add_warning("defaults.location", "No default location configured");
        }

        result
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(AppError::from)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .map_err(AppError::from)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Other("No user config directory on this system".into()))?
            .join("powderline");

        Ok(config_dir.join("config.toml"))
    }
}

fn is_positive(km: f64) -> bool {
    km.is_finite() && km > 0.0
}

/// An API root must be an absolute http(s) URL with a host.
fn check_base_url(value: &str) -> std::result::Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("Not a URL: {}", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("Expected an http or https URL, got {}://", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("URL has no host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_defaults_have_no_issues() {
        let result = Config::default().validate();
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_base_urls_are_checked() {
        let mut config = Config::default();
        config.weather.base_url = "open-meteo".to_string();
        config.roads.base_url = "ftp://api.open511.gov.bc.ca".to_string();
        let result = config.validate();

        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["weather.base_url", "roads.base_url"]);
        assert!(result.errors[1].message.contains("ftp://"));
        assert_eq!(check_base_url("http://127.0.0.1:8080"), Ok(()));
    }

    #[test]
    fn test_forecast_days_out_of_range() {
        let mut config = Config::default();
        config.weather.forecast_days = 0;
        assert!(!config.validate().is_valid());
        config.weather.forecast_days = 17;
        assert!(!config.validate().is_valid());
        config.weather.forecast_days = 16;
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_unknown_language_is_error() {
        let mut config = Config::default();
        config.avalanche.language = "de".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "avalanche.language"));
    }

    #[test]
    fn test_zero_ttl_is_warning() {
        let mut config = Config::default();
        config.roads.cache_ttl_minutes = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "roads.cache_ttl_minutes"));
    }

    #[test]
    fn test_error_summary_joins_issues() {
        let mut result = ValidationResult::default();
        result.add_error("roads.radius_km", "Radius must be greater than 0");
        result.add_error("weather.timezone", "Timezone must not be empty");
        assert_eq!(
            result.error_summary(),
            "Radius must be greater than 0 (roads.radius_km); Timezone must not be empty (weather.timezone)"
        );
    }

    #[test]
    fn test_load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.defaults.location, "whistler-blackcomb");
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.roads.max_events, config.roads.max_events);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[weather]\ntemperature_unit = \"fahrenheit\"\n\n[roads]\nradius_km = 25.0\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weather.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(config.weather.forecast_days, 7);
        assert_eq!(config.roads.radius_km, 25.0);
        assert_eq!(config.roads.max_events, 10);
        assert_eq!(config.avalanche.language, "en");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather\nbase_url = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        // A directory exists but cannot be read as a file
        let err = Config::load_from(dir.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<AppError>(), Some(AppError::Io(_))));
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_validated_rejects_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[http]\ntimeout_secs = 0\n").unwrap();

        let err = Config::load_validated(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("http.timeout_secs"));
    }

    #[test]
    fn test_fahrenheit_conversion() {
        assert!((TemperatureUnit::Fahrenheit.to_celsius(14.0) - -10.0).abs() < 1e-9);
        assert_eq!(TemperatureUnit::Auto.to_celsius(-4.0), -4.0);
        assert_eq!(TemperatureUnit::Auto.api_value(), "celsius");
    }
}
