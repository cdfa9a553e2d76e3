//! Mountain weather for Powderline
//!
//! Open-Meteo forecasts, WMO condition mapping, powder scoring and the
//! catalog of BC ski and backcountry locations.

pub mod location;
pub mod powder;
pub mod provider;
pub mod types;

pub use location::{catalog, find, nearest_location, resolve};
pub use powder::{PowderRating, PowderScore};
pub use provider::WeatherProvider;
pub use types::*;
