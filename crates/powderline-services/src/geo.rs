//! Coordinate helpers: great-circle distance and nearest-match lookups.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Latitude/longitude in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// From a GeoJSON-style `[longitude, latitude]` pair.
    pub fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected \"latitude,longitude\" in decimal degrees, got {0:?}")]
pub struct ParseCoordinatesError(pub String);

impl FromStr for Coordinates {
    type Err = ParseCoordinatesError;

    /// Parse `"49.7,-123.1"` (whitespace around either number is allowed).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCoordinatesError(s.to_string());
        let (lat, lon) = s.split_once(',').ok_or_else(err)?;
        let latitude: f64 = lat.trim().parse().map_err(|_| err())?;
        let longitude: f64 = lon.trim().parse().map_err(|_| err())?;
        let coords = Coordinates::new(latitude, longitude);
        if coords.is_valid() {
            Ok(coords)
        } else {
            Err(err())
        }
    }
}

/// Anything with a position that can take part in nearest-match lookups.
pub trait Located {
    fn coordinates(&self) -> Coordinates;
}

impl<T: Located> Located for &T {
    fn coordinates(&self) -> Coordinates {
        (**self).coordinates()
    }
}

impl Located for Coordinates {
    fn coordinates(&self) -> Coordinates {
        *self
    }
}

/// Haversine distance between two points in kilometres.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    haversine::distance(
        haversine::Location {
            latitude: a.latitude,
            longitude: a.longitude,
        },
        haversine::Location {
            latitude: b.latitude,
            longitude: b.longitude,
        },
        haversine::Units::Kilometers,
    )
}

/// Closest item to `point`, with its distance in km.
///
/// Items with invalid coordinates are ignored. On equal distances the earlier
/// item wins.
pub fn nearest<T: Located>(point: Coordinates, items: &[T]) -> Option<(&T, f64)> {
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let coords = item.coordinates();
        if !coords.is_valid() {
            continue;
        }
        let d = distance_km(point, coords);
        match best {
            Some((_, best_d)) if best_d <= d => {}
            _ => best = Some((item, d)),
        }
    }
    best
}

/// All items within `radius_km` of `point`, closest first.
pub fn within_radius<T: Located>(
    point: Coordinates,
    items: &[T],
    radius_km: f64,
) -> Vec<(&T, f64)> {
    let mut hits: Vec<(&T, f64)> = items
        .iter()
        .filter(|item| item.coordinates().is_valid())
        .map(|item| (item, distance_km(point, item.coordinates())))
        .filter(|(_, d)| *d <= radius_km)
        .collect();
    hits.sort_by(|a, b| a.1.total_cmp(&b.1));
    hits
}

/// Axis-aligned box in degrees, as used by Open511 and Avalanche Canada.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// From a GeoJSON `[west, south, east, north]` array.
    pub fn from_array(b: [f64; 4]) -> Self {
        Self {
            west: b[0],
            south: b[1],
            east: b[2],
            north: b[3],
        }
    }

    /// Box that encloses a circle of `radius_km` around `center`.
    pub fn around(center: Coordinates, radius_km: f64) -> Self {
        const KM_PER_DEGREE: f64 = 111.32;
        let dlat = radius_km / KM_PER_DEGREE;
        let cos_lat = center.latitude.to_radians().cos().abs().max(0.01);
        let dlon = radius_km / (KM_PER_DEGREE * cos_lat);
        Self {
            west: (center.longitude - dlon).max(-180.0),
            south: (center.latitude - dlat).max(-90.0),
            east: (center.longitude + dlon).min(180.0),
            north: (center.latitude + dlat).min(90.0),
        }
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }

    /// `west,south,east,north` with five decimals, the Open511 `bbox` format.
    pub fn to_query(&self) -> String {
        format!(
            "{:.5},{:.5},{:.5},{:.5}",
            self.west, self.south, self.east, self.north
        )
    }
}
