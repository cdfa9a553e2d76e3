use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use powderline_core::NetworkError;
use powderline_services::{Coordinates, Located};
use serde::{Deserialize, Serialize};

use crate::powder::PowderScore;

pub use powderline_core::TemperatureUnit;

/// Sky and precipitation state, reduced from a WMO code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    HeavySnow,
    /// Freezing drizzle or freezing rain
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Codes Open-Meteo does not document fall back to `Clear`.
    pub fn from_wmo_code(code: i32) -> Self {
        use WeatherCondition::*;
        match code {
            0 => Clear,
            1 | 2 => PartlyCloudy,
            3 => Cloudy,
            45 | 48 => Fog,
            51..=55 => Drizzle,
            56 | 57 | 66 | 67 => Sleet,
            61 | 63 | 80 => Rain,
            65 | 81 | 82 => HeavyRain,
            71 | 73 | 77 | 85 => Snow,
            75 | 86 => HeavySnow,
            95..=99 => Thunderstorm,
            _ => Clear,
        }
    }

    pub fn description(&self) -> &'static str {
        use WeatherCondition::*;
        match self {
            Clear => "Clear",
            PartlyCloudy => "Partly cloudy",
            Cloudy => "Overcast",
            Fog => "Fog",
            Drizzle => "Drizzle",
            Rain => "Rain",
            HeavyRain => "Heavy rain",
            Snow => "Snow",
            HeavySnow => "Heavy snow",
            Sleet => "Freezing rain",
            Thunderstorm => "Thunderstorm",
        }
    }

    /// Icon slug for front ends.
    pub fn icon_name(&self) -> &'static str {
        use WeatherCondition::*;
        match self {
            Clear => "clear",
            PartlyCloudy => "partly-cloudy",
            Cloudy | Fog => "overcast",
            Drizzle | Rain | HeavyRain => "rain",
            Snow | HeavySnow => "snow",
            Sleet => "sleet",
            Thunderstorm => "storm",
        }
    }

    pub fn is_snow(&self) -> bool {
        matches!(self, Self::Snow | Self::HeavySnow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Resort,
    Backcountry,
    Pass,
}

impl LocationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resort => "resort",
            Self::Backcountry => "backcountry",
            Self::Pass => "pass",
        }
    }
}

/// A place a forecast can be requested for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Stable slug, e.g. `whistler-blackcomb`
    pub id: String,
    pub name: String,
    pub region: String,
    pub kind: LocationKind,
    pub coordinates: Coordinates,
    /// Elevation the forecast is downscaled to, usually mid-mountain
    pub elevation_m: Option<f64>,
    /// Highway numbers used to reach the location, e.g. `["99"]`
    pub highways: Vec<String>,
}

impl Located for Location {
    fn coordinates(&self) -> Coordinates {
        self.coordinates
    }
}

/// Current conditions at the forecast point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Local time in the requested timezone
    pub observed_at: NaiveDateTime,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    /// km/h
    pub wind_speed: Option<f64>,
    pub wind_gusts: Option<f64>,
    pub snowfall_cm: f64,
    pub weather_code: Option<i32>,
    pub condition: WeatherCondition,
}

/// Hourly forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub time: NaiveDateTime,
    pub temperature: Option<f64>,
    pub snowfall_cm: f64,
    pub precipitation_mm: f64,
    pub precipitation_chance: Option<u8>,
    pub wind_speed: Option<f64>,
    pub freezing_level_m: Option<f64>,
    pub condition: WeatherCondition,
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub snowfall_cm: f64,
    pub precipitation_mm: f64,
    pub precipitation_chance: Option<u8>,
    pub wind_speed_max: Option<f64>,
    pub wind_gusts_max: Option<f64>,
    pub condition: WeatherCondition,
    pub sunrise: Option<NaiveTime>,
    pub sunset: Option<NaiveTime>,
    pub powder: PowderScore,
}

/// Complete weather data bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub location: Location,
    /// Elevation Open-Meteo used for the grid cell
    pub model_elevation_m: Option<f64>,
    pub unit: TemperatureUnit,
    pub current: Option<CurrentConditions>,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DayForecast>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherData {
    /// Local "now" for window calculations: the observation time, falling back
    /// to the first hourly slot.
    pub fn reference_time(&self) -> Option<NaiveDateTime> {
        self.current
            .as_ref()
            .map(|c| c.observed_at)
            .or_else(|| self.hourly.first().map(|h| h.time))
    }

    /// Hourly slots in `[from, from + hours)`.
    pub fn hours_after(&self, from: NaiveDateTime, hours: i64) -> Vec<&HourlyForecast> {
        let end = from + Duration::hours(hours);
        self.hourly
            .iter()
            .filter(|h| h.time >= from && h.time < end)
            .collect()
    }

    /// Hourly slots in `[to - hours, to)`.
    pub fn hours_before(&self, to: NaiveDateTime, hours: i64) -> Vec<&HourlyForecast> {
        let start = to - Duration::hours(hours);
        self.hourly
            .iter()
            .filter(|h| h.time >= start && h.time < to)
            .collect()
    }

    /// Forecast snowfall (cm) over the next `hours` from `from`.
    pub fn snowfall_next_hours(&self, from: NaiveDateTime, hours: i64) -> f64 {
        self.hours_after(from, hours).iter().map(|h| h.snowfall_cm).sum()
    }

    /// Snowfall (cm) over the `hours` before `to`.
    pub fn snowfall_past_hours(&self, to: NaiveDateTime, hours: i64) -> f64 {
        self.hours_before(to, hours).iter().map(|h| h.snowfall_cm).sum()
    }

    /// Days from the reference date onwards.
    pub fn upcoming_days(&self) -> Vec<&DayForecast> {
        match self.reference_time() {
            Some(now) => self.daily.iter().filter(|d| d.date >= now.date()).collect(),
            None => self.daily.iter().collect(),
        }
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unknown location: {0}")]
    UnknownLocation(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::Parse(_) => "Weather data could not be read. Please try again later.",
            Self::UnknownLocation(_) => "Location not found. Use a catalog name or \"lat,lon\".",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_retryable())
    }
}
