//! Powder scoring.
//!
//! A 0-10 score: 24 h snowfall sets the base (30 cm saturates), then snow
//! quality adjusts it. Cold snow scores higher, warm or wind-affected snow
//! lower.

use serde::{Deserialize, Serialize};

use crate::types::{DayForecast, HourlyForecast, TemperatureUnit};

pub const MAX_SCORE: f64 = 10.0;
/// Snowfall that earns the full base score.
pub const SATURATION_CM: f64 = 30.0;
/// Below this nothing counts as new snow.
pub const MIN_SNOWFALL_CM: f64 = 1.0;
/// Snowfall alone that makes a powder day.
pub const POWDER_DAY_CM: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowderRating {
    Poor,
    Fair,
    Good,
    Great,
    Epic,
}

impl PowderRating {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Self::Epic
        } else if score >= 6.0 {
            Self::Great
        } else if score >= 4.0 {
            Self::Good
        } else if score >= 2.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Poor => "Poor",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Great => "Great",
            Self::Epic => "Epic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowderScore {
    pub score: f64,
    pub snowfall_cm: f64,
    pub rating: PowderRating,
}

impl Default for PowderScore {
    fn default() -> Self {
        Self {
            score: 0.0,
            snowfall_cm: 0.0,
            rating: PowderRating::Poor,
        }
    }
}

/// Snow quality adjustment for a mean temperature in Celsius.
pub fn temperature_adjustment(celsius: f64) -> f64 {
    if celsius <= -8.0 {
        1.0
    } else if celsius <= -3.0 {
        0.0
    } else if celsius <= 0.0 {
        -1.0
    } else {
        -2.0
    }
}

/// Wind-affected snow penalty for a maximum wind speed in km/h.
pub fn wind_adjustment(kmh: f64) -> f64 {
    if kmh >= 50.0 {
        -2.0
    } else if kmh >= 30.0 {
        -1.0
    } else {
        0.0
    }
}

impl PowderScore {
    /// Score `snowfall_cm` of new snow at `temperature_c` with peak wind `wind_kmh`.
    ///
    /// Missing temperature or wind leaves that adjustment out.
    pub fn compute(snowfall_cm: f64, temperature_c: Option<f64>, wind_kmh: Option<f64>) -> Self {
        let snowfall_cm = if snowfall_cm.is_finite() {
            snowfall_cm.max(0.0)
        } else {
            0.0
        };

        if snowfall_cm < MIN_SNOWFALL_CM {
            return Self {
                snowfall_cm,
                ..Self::default()
            };
        }

        let base = (snowfall_cm / SATURATION_CM * MAX_SCORE).min(MAX_SCORE);
        let temp = temperature_c
            .filter(|t| t.is_finite())
            .map(temperature_adjustment)
            .unwrap_or(0.0);
        let wind = wind_kmh
            .filter(|w| w.is_finite())
            .map(wind_adjustment)
            .unwrap_or(0.0);

        let score = round1((base + temp + wind).clamp(0.0, MAX_SCORE));
        Self {
            score,
            snowfall_cm: round1(snowfall_cm),
            rating: PowderRating::from_score(score),
        }
    }

    /// Score a run of hourly slots (normally 24).
    ///
    /// Temperature is the mean over every hour in the run that reports one.
    pub fn for_hours(hours: &[&HourlyForecast], unit: TemperatureUnit) -> Self {
        let snowfall: f64 = hours.iter().map(|h| h.snowfall_cm).sum();

        let temps: Vec<f64> = hours.iter().filter_map(|h| h.temperature).collect();
        let temperature = mean(&temps).map(|t| unit.to_celsius(t));

        let wind = hours
            .iter()
            .filter_map(|h| h.wind_speed)
            .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.max(w))));

        Self::compute(snowfall, temperature, wind)
    }

    /// Score a forecast day from its snowfall total, mean of high/low and peak wind.
    pub fn for_day(
        snowfall_cm: f64,
        high: Option<f64>,
        low: Option<f64>,
        wind_speed_max: Option<f64>,
        unit: TemperatureUnit,
    ) -> Self {
        let temperature = match (high, low) {
            (Some(h), Some(l)) => Some((h + l) / 2.0),
            (Some(t), None) | (None, Some(t)) => Some(t),
            (None, None) => None,
        };
        Self::compute(
            snowfall_cm,
            temperature.map(|t| unit.to_celsius(t)),
            wind_speed_max,
        )
    }

    pub fn is_powder_day(&self) -> bool {
        self.score >= 6.0 || self.snowfall_cm >= POWDER_DAY_CM
    }
}

/// Highest-scoring day; the earliest wins ties.
pub fn best_day<'a, I>(days: I) -> Option<&'a DayForecast>
where
    I: IntoIterator<Item = &'a DayForecast>,
{
    let mut best: Option<&'a DayForecast> = None;
    for day in days {
        match best {
            Some(b) if b.powder.score >= day.powder.score => {}
            _ => best = Some(day),
        }
    }
    best
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
