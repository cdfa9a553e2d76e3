//! DriveBC road events for Powderline
//!
//! Fetches active Open511 events around a location and keeps the ones that
//! matter for getting to the hill, most important first.

pub mod client;
pub mod error;
pub mod filter;
pub mod types;

pub use client::RoadEventsClient;
pub use error::RoadError;
pub use filter::{normalize_highway, priority, EventFilter, RankedEvent};
pub use types::{EventType, RoadEvent, Severity};
