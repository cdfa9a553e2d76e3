//! DriveBC Open511 wire format and normalized road events.

use chrono::{DateTime, Utc};
use powderline_services::{distance_km, Coordinates};
use serde::{Deserialize, Serialize};

use crate::filter::normalize_highway;

// ---------------------------------------------------------------------------
// API types (Open511)
// ---------------------------------------------------------------------------

/// One page of `/events`. Events stay raw so a single malformed entry does
/// not sink the whole page.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEventsPage {
    pub events: Vec<serde_json::Value>,
    pub pagination: Option<ApiPagination>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiPagination {
    #[serde(default)]
    pub offset: usize,
    pub next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiEvent {
    pub id: String,
    pub url: Option<String>,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_subtypes: Vec<String>,
    pub severity: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub geography: Option<ApiGeography>,
    #[serde(default)]
    pub roads: Vec<ApiRoad>,
    #[serde(default)]
    pub areas: Vec<ApiArea>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ApiGeography {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
    MultiLineString { coordinates: Vec<Vec<[f64; 2]>> },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRoad {
    pub name: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiArea {
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Construction,
    SpecialEvent,
    Incident,
    WeatherCondition,
    RoadCondition,
    Other,
}

impl EventType {
    pub fn from_api(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "CONSTRUCTION" => Self::Construction,
            "SPECIAL_EVENT" => Self::SpecialEvent,
            "INCIDENT" => Self::Incident,
            "WEATHER_CONDITION" => Self::WeatherCondition,
            "ROAD_CONDITION" => Self::RoadCondition,
            _ => Self::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Construction => "Construction",
            Self::SpecialEvent => "Special event",
            Self::Incident => "Incident",
            Self::WeatherCondition => "Weather condition",
            Self::RoadCondition => "Road condition",
            Self::Other => "Other",
        }
    }

    /// Road and weather condition reports matter even when minor.
    pub fn is_condition_report(&self) -> bool {
        matches!(self, Self::WeatherCondition | Self::RoadCondition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
    Unknown,
}

impl Severity {
    pub fn from_api(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "MINOR" => Self::Minor,
            "MODERATE" => Self::Moderate,
            "MAJOR" => Self::Major,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Minor => "Minor",
            Self::Moderate => "Moderate",
            Self::Major => "Major",
            Self::Unknown => "Unknown",
        }
    }
}

/// A DriveBC event normalized for filtering and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadEvent {
    pub id: String,
    pub event_type: EventType,
    pub subtypes: Vec<String>,
    pub severity: Severity,
    pub status: String,
    pub headline: String,
    pub description: String,
    /// Road names as published, e.g. "Highway 99"
    pub roads: Vec<String>,
    /// Normalized highway numbers, e.g. "99"
    pub highways: Vec<String>,
    pub district: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Point or line vertices of the event geometry
    pub points: Vec<Coordinates>,
    pub closure: bool,
    pub url: Option<String>,
}

impl RoadEvent {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("ACTIVE")
    }

    fn text(&self) -> String {
        format!("{} {}", self.headline, self.description).to_lowercase()
    }

    pub fn is_avalanche_control(&self) -> bool {
        self.subtypes.iter().any(|s| s.to_uppercase().contains("AVALANCHE"))
            || self.text().contains("avalanche control")
    }

    pub fn requires_chains(&self) -> bool {
        let text = self.text();
        self.subtypes.iter().any(|s| s.to_uppercase().contains("CHAIN"))
            || text.contains("chain-up")
            || text.contains("chains required")
            || text.contains("chain up")
    }

    /// Distance from `point` to the closest vertex of the event geometry.
    pub fn distance_to(&self, point: Coordinates) -> Option<f64> {
        self.points
            .iter()
            .filter(|p| p.is_valid())
            .map(|p| distance_km(point, *p))
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn is_on_highway(&self, highways: &[String]) -> bool {
        self.highways.iter().any(|h| highways.contains(h))
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<ApiEvent> for RoadEvent {
    fn from(event: ApiEvent) -> Self {
        let points = match event.geography {
            Some(ApiGeography::Point { coordinates }) => {
                vec![Coordinates::from_lon_lat(coordinates)]
            }
            Some(ApiGeography::LineString { coordinates }) => {
                coordinates.into_iter().map(Coordinates::from_lon_lat).collect()
            }
            Some(ApiGeography::MultiLineString { coordinates }) => coordinates
                .into_iter()
                .flatten()
                .map(Coordinates::from_lon_lat)
                .collect(),
            Some(ApiGeography::Unknown) | None => Vec::new(),
        };

        let headline_closed = event.headline.to_uppercase().contains("CLOSURE")
            || event.headline.to_uppercase().contains("CLOSED");
        let closure = headline_closed
            || event
                .roads
                .iter()
                .any(|r| r.state.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("CLOSED")))
            || event
                .event_subtypes
                .iter()
                .map(|s| s.to_uppercase())
                .any(|s| s.contains("CLOSED") || s.contains("CLOSURE"));

        let roads: Vec<String> = event.roads.into_iter().filter_map(|r| r.name).collect();
        let mut highways: Vec<String> = roads.iter().filter_map(|r| normalize_highway(r)).collect();
        highways.sort();
        highways.dedup();

        Self {
            id: event.id,
            event_type: event
                .event_type
                .as_deref()
                .map(EventType::from_api)
                .unwrap_or(EventType::Other),
            subtypes: event.event_subtypes,
            severity: event
                .severity
                .as_deref()
                .map(Severity::from_api)
                .unwrap_or(Severity::Unknown),
            status: event.status,
            headline: event.headline,
            description: event.description.trim().to_string(),
            roads,
            highways,
            district: event.areas.into_iter().find_map(|a| a.name),
            created: event.created.as_deref().and_then(parse_timestamp),
            updated: event.updated.as_deref().and_then(parse_timestamp),
            points,
            closure,
            url: event.url,
        }
    }
}
