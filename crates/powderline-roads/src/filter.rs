//! Which road events matter for a ski location, and in what order.

use std::cmp::Ordering;

use powderline_core::RoadsConfig;
use powderline_services::Coordinates;
use serde::Serialize;

use crate::types::{EventType, RoadEvent, Severity};

const CLOSURE_BONUS: u32 = 100;
const HAZARD_BONUS: u32 = 20;
const ROUTE_BONUS: u32 = 10;

/// Highway aliases that appear in road names without a number.
const HIGHWAY_ALIASES: &[(&str, &str)] = &[
    ("TRANS-CANADA", "1"),
    ("TRANS CANADA", "1"),
    ("COQUIHALLA", "5"),
    ("SEA TO SKY", "99"),
    ("SEA-TO-SKY", "99"),
    ("CROWSNEST", "3"),
];

/// Reduce a road name to its highway number.
///
/// `Highway 99`, `Hwy 99`, `99` and `BC-99` all become `99`; suffixed routes
/// keep their letter (`Highway 3B` is `3B`). Returns `None` for local roads.
pub fn normalize_highway(name: &str) -> Option<String> {
    let upper = name.trim().to_uppercase();

    let mut rest = upper.as_str();
    for prefix in ["HIGHWAY", "HWY.", "HWY", "BC-", "BC ", "ROUTE"] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    let rest = rest.trim_start_matches([' ', '-', '#']);

    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let suffix: String = rest[digits.len()..]
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        // A single route letter only; "99N" style directions are dropped
        let suffix = if suffix.len() == 1 && !matches!(suffix.as_str(), "N" | "S" | "E" | "W") {
            suffix
        } else {
            String::new()
        };
        return Some(format!("{}{}", digits, suffix));
    }

    HIGHWAY_ALIASES
        .iter()
        .find(|(alias, _)| upper.contains(alias))
        .map(|(_, number)| number.to_string())
}

/// Ranking score: higher is more important.
pub fn priority(event: &RoadEvent, on_route: bool) -> u32 {
    let mut score = 0;
    if event.closure {
        score += CLOSURE_BONUS;
    }
    score += match event.severity {
        Severity::Major => 30,
        Severity::Moderate => 20,
        Severity::Minor => 10,
        Severity::Unknown => 5,
    };
    score += match event.event_type {
        EventType::Incident => 15,
        EventType::RoadCondition | EventType::WeatherCondition => 12,
        EventType::Construction => 5,
        EventType::SpecialEvent => 2,
        EventType::Other => 0,
    };
    if event.is_avalanche_control() || event.requires_chains() {
        score += HAZARD_BONUS;
    }
    if on_route {
        score += ROUTE_BONUS;
    }
    score
}

/// An event that passed the filter, with its ranking inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEvent {
    pub event: RoadEvent,
    pub distance_km: f64,
    /// On one of the location's access highways
    pub on_route: bool,
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventFilter {
    pub radius_km: f64,
    pub route_radius_km: f64,
    pub include_minor: bool,
    pub max_events: usize,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::from(&RoadsConfig::default())
    }
}

impl From<&RoadsConfig> for EventFilter {
    fn from(config: &RoadsConfig) -> Self {
        Self {
            radius_km: config.radius_km,
            route_radius_km: config.route_radius_km,
            include_minor: config.include_minor,
            max_events: config.max_events,
        }
    }
}

impl EventFilter {
    /// Largest distance any kept event can be from the location.
    pub fn search_radius_km(&self) -> f64 {
        self.radius_km.max(self.route_radius_km)
    }

    /// Rank `event` for a location at `point` reached via `highways`, or
    /// `None` when it should be dropped.
    pub fn evaluate(
        &self,
        event: &RoadEvent,
        point: Coordinates,
        highways: &[String],
    ) -> Option<RankedEvent> {
        if !event.is_active() {
            return None;
        }

        let keep_minor =
            self.include_minor || event.closure || event.event_type.is_condition_report();
        if event.severity == Severity::Minor && !keep_minor {
            return None;
        }

        let distance_km = event.distance_to(point)?;
        let on_route = event.is_on_highway(highways);
        let in_range =
            distance_km <= self.radius_km || (on_route && distance_km <= self.route_radius_km);
        if !in_range {
            return None;
        }

        Some(RankedEvent {
            priority: priority(event, on_route),
            event: event.clone(),
            distance_km,
            on_route,
        })
    }

    /// Filter, rank and truncate `events` for one location.
    ///
    /// Highest priority first, then closest, then most recently updated.
    pub fn apply(
        &self,
        events: &[RoadEvent],
        point: Coordinates,
        highways: &[String],
    ) -> Vec<RankedEvent> {
        let highways: Vec<String> = highways
            .iter()
            .filter_map(|h| normalize_highway(h))
            .collect();

        let mut ranked: Vec<RankedEvent> = events
            .iter()
            .filter_map(|e| self.evaluate(e, point, &highways))
            .collect();

        ranked.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.distance_km.total_cmp(&b.distance_km))
                .then_with(|| match (a.event.updated, b.event.updated) {
                    (Some(x), Some(y)) => y.cmp(&x),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
        });
        ranked.truncate(self.max_events);

        tracing::debug!(
            "{} of {} road events relevant to {}",
            ranked.len(),
            events.len(),
            point
        );
        ranked
    }
}
