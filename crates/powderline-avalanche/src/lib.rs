//! Avalanche Canada forecasts for Powderline
//!
//! Danger ratings per elevation band, forecast zone matching and a cached
//! client for the public forecast API.

pub mod client;
pub mod danger;
pub mod error;
pub mod types;
pub mod zones;

pub use client::{AvalancheClient, ZoneForecast};
pub use danger::{DangerRating, DayRatings, ElevationBand};
pub use error::AvalancheError;
pub use types::{strip_html, AvalancheForecast, AvalancheProblem};
pub use zones::{match_zone, nearest_zone_distance, ForecastZone, ZoneMatch};
