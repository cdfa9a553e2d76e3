//! Forecast regions and matching a point to one.

use powderline_services::{distance_km, nearest, BoundingBox, Coordinates, Located};
use serde::{Deserialize, Serialize};

/// An Avalanche Canada forecast region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastZone {
    /// Area id, shared with the products endpoint
    pub id: String,
    pub name: String,
    pub centroid: Coordinates,
    pub bbox: Option<BoundingBox>,
    pub product_id: Option<String>,
    pub url: Option<String>,
}

impl Located for ForecastZone {
    fn coordinates(&self) -> Coordinates {
        self.centroid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneMatch {
    pub zone: ForecastZone,
    /// Distance from the point to the zone centroid
    pub distance_km: f64,
    /// Whether the point lies inside the zone's bounding box
    pub inside: bool,
}

/// Pick the forecast zone for `point`.
///
/// Zones whose bounding box contains the point take precedence, closest
/// centroid first. Otherwise the closest centroid within `max_km` is used.
pub fn match_zone(point: Coordinates, zones: &[ForecastZone], max_km: f64) -> Option<ZoneMatch> {
    let containing: Vec<&ForecastZone> = zones
        .iter()
        .filter(|z| z.bbox.is_some_and(|b| b.contains(point)))
        .collect();

    if let Some((zone, distance_km)) = nearest(point, &containing) {
        return Some(ZoneMatch {
            zone: (*zone).clone(),
            distance_km,
            inside: true,
        });
    }

    nearest(point, zones)
        .filter(|(_, d)| *d <= max_km)
        .map(|(zone, distance_km)| ZoneMatch {
            zone: zone.clone(),
            distance_km,
            inside: false,
        })
}

/// Distance to the closest zone centroid, for error reporting.
pub fn nearest_zone_distance(point: Coordinates, zones: &[ForecastZone]) -> Option<f64> {
    zones
        .iter()
        .filter(|z| z.centroid.is_valid())
        .map(|z| distance_km(point, z.centroid))
        .min_by(|a, b| a.total_cmp(b))
}
