//! Report types shared by the dashboard and its renderers.

use chrono::{DateTime, Utc};
use powderline_avalanche::{AvalancheError, ZoneForecast};
use powderline_roads::{RankedEvent, RoadError};
use powderline_services::{Cached, Freshness};
use powderline_weather::powder::best_day;
use powderline_weather::{
    CurrentConditions, DayForecast, Location, PowderScore, TemperatureUnit, WeatherData,
    WeatherError,
};
use serde::Serialize;

/// Hours covered by the headline powder score.
pub const POWDER_WINDOW_HOURS: i64 = 24;

/// Provider errors as a report section sees them.
pub trait SectionError: std::fmt::Display {
    fn user_message(&self) -> String;
    fn is_retryable(&self) -> bool;
}

impl SectionError for WeatherError {
    fn user_message(&self) -> String {
        WeatherError::user_message(self).to_string()
    }

    fn is_retryable(&self) -> bool {
        WeatherError::is_retryable(self)
    }
}

impl SectionError for AvalancheError {
    fn user_message(&self) -> String {
        AvalancheError::user_message(self)
    }

    fn is_retryable(&self) -> bool {
        AvalancheError::is_retryable(self)
    }
}

impl SectionError for RoadError {
    fn user_message(&self) -> String {
        RoadError::user_message(self).to_string()
    }

    fn is_retryable(&self) -> bool {
        RoadError::is_retryable(self)
    }
}

/// One part of a report: data with its freshness, or why it is missing.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Available(Cached<T>),
    Unavailable {
        message: String,
        detail: String,
        retryable: bool,
    },
}

impl<T> Section<T> {
    pub fn from_result<E: SectionError>(name: &str, result: Result<Cached<T>, E>) -> Self {
        match result {
            Ok(cached) => Self::Available(cached),
            Err(e) => {
                tracing::warn!("{} unavailable: {}", name, e);
                Self::Unavailable {
                    message: e.user_message(),
                    detail: e.to_string(),
                    retryable: e.is_retryable(),
                }
            }
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Available(cached) => Some(&cached.value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn freshness(&self) -> Option<&Freshness> {
        match self {
            Self::Available(cached) => Some(&cached.freshness),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Display-ready weather for a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSummary {
    pub unit: TemperatureUnit,
    pub model_elevation_m: Option<f64>,
    pub current: Option<CurrentConditions>,
    pub snow_next_24h_cm: f64,
    pub snow_past_24h_cm: f64,
    /// Score for the 24 h following the observation time
    pub powder: PowderScore,
    /// Freezing level at the observation hour
    pub freezing_level_m: Option<f64>,
    pub best_day: Option<DayForecast>,
    pub days: Vec<DayForecast>,
}

impl WeatherSummary {
    pub fn from_data(data: &WeatherData) -> Self {
        let now = data.reference_time();
        let (next, past, powder, freezing_level_m) = match now {
            Some(now) => {
                let upcoming = data.hours_after(now, POWDER_WINDOW_HOURS);
                (
                    data.snowfall_next_hours(now, POWDER_WINDOW_HOURS),
                    data.snowfall_past_hours(now, POWDER_WINDOW_HOURS),
                    PowderScore::for_hours(&upcoming, data.unit),
                    upcoming.first().and_then(|h| h.freezing_level_m),
                )
            }
            None => (0.0, 0.0, PowderScore::default(), None),
        };

        let days: Vec<DayForecast> = data.upcoming_days().into_iter().cloned().collect();
        Self {
            unit: data.unit,
            model_elevation_m: data.model_elevation_m,
            current: data.current.clone(),
            snow_next_24h_cm: round1(next),
            snow_past_24h_cm: round1(past),
            powder,
            freezing_level_m,
            best_day: best_day(&days).cloned(),
            days,
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Everything known about one location.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub location: Location,
    pub generated_at: DateTime<Utc>,
    pub weather: Section<WeatherSummary>,
    pub avalanche: Section<ZoneForecast>,
    pub roads: Section<Vec<RankedEvent>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PowderEntry {
    pub location: Location,
    pub powder: PowderScore,
    pub snow_past_24h_cm: f64,
    pub best_day: Option<DayForecast>,
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingFailure {
    pub location: Location,
    pub message: String,
}

/// Locations ordered by the next 24 h powder score, best first.
#[derive(Debug, Clone, Serialize)]
pub struct PowderRanking {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<PowderEntry>,
    pub failures: Vec<RankingFailure>,
}
