//! Per-location reports for Powderline
//!
//! Combines weather, avalanche and road data into one report per location,
//! ranks locations by incoming powder and renders both as plain text.

pub mod dashboard;
pub mod render;
pub mod report;

pub use dashboard::Dashboard;
pub use report::{PowderEntry, PowderRanking, RankingFailure, Report, Section, WeatherSummary};
