//! Catalog of BC ski resorts, passes and backcountry areas, plus lookup of
//! free-form queries and coordinates against it.

use std::sync::OnceLock;

use powderline_services::{nearest, Coordinates};

use crate::types::{Location, LocationKind, WeatherError};

/// Ad-hoc points within this distance borrow the name and highways of the
/// nearest catalog entry.
const NEAR_MATCH_KM: f64 = 50.0;

struct Entry {
    id: &'static str,
    name: &'static str,
    region: &'static str,
    kind: LocationKind,
    latitude: f64,
    longitude: f64,
    elevation_m: f64,
    highways: &'static [&'static str],
}

const ENTRIES: &[Entry] = &[
    Entry {
        id: "whistler-blackcomb",
        name: "Whistler Blackcomb",
        region: "Sea to Sky",
        kind: LocationKind::Resort,
        latitude: 50.1150,
        longitude: -122.9486,
        elevation_m: 1500.0,
        highways: &["99"],
    },
    Entry {
        id: "cypress-mountain",
        name: "Cypress Mountain",
        region: "North Shore",
        kind: LocationKind::Resort,
        latitude: 49.3960,
        longitude: -123.2045,
        elevation_m: 1100.0,
        highways: &["99", "1"],
    },
    Entry {
        id: "grouse-mountain",
        name: "Grouse Mountain",
        region: "North Shore",
        kind: LocationKind::Resort,
        latitude: 49.3800,
        longitude: -123.0810,
        elevation_m: 1100.0,
        highways: &["1"],
    },
    Entry {
        id: "mount-seymour",
        name: "Mount Seymour",
        region: "North Shore",
        kind: LocationKind::Resort,
        latitude: 49.3667,
        longitude: -122.9500,
        elevation_m: 1100.0,
        highways: &["1"],
    },
    Entry {
        id: "manning-park",
        name: "Manning Park",
        region: "Cascades",
        kind: LocationKind::Resort,
        latitude: 49.0650,
        longitude: -120.7880,
        elevation_m: 1600.0,
        highways: &["3"],
    },
    Entry {
        id: "sun-peaks",
        name: "Sun Peaks",
        region: "Thompson",
        kind: LocationKind::Resort,
        latitude: 50.8830,
        longitude: -119.8870,
        elevation_m: 1600.0,
        highways: &["5"],
    },
    Entry {
        id: "big-white",
        name: "Big White",
        region: "Okanagan",
        kind: LocationKind::Resort,
        latitude: 49.7250,
        longitude: -118.9330,
        elevation_m: 1900.0,
        highways: &["33"],
    },
    Entry {
        id: "silver-star",
        name: "Silver Star",
        region: "Okanagan",
        kind: LocationKind::Resort,
        latitude: 50.3600,
        longitude: -119.0600,
        elevation_m: 1600.0,
        highways: &["97"],
    },
    Entry {
        id: "revelstoke",
        name: "Revelstoke Mountain Resort",
        region: "Columbia",
        kind: LocationKind::Resort,
        latitude: 50.9580,
        longitude: -118.1640,
        elevation_m: 1500.0,
        highways: &["1", "23"],
    },
    Entry {
        id: "kicking-horse",
        name: "Kicking Horse",
        region: "Purcells",
        kind: LocationKind::Resort,
        latitude: 51.2970,
        longitude: -117.0480,
        elevation_m: 1800.0,
        highways: &["1", "95"],
    },
    Entry {
        id: "red-mountain",
        name: "RED Mountain",
        region: "Kootenay Boundary",
        kind: LocationKind::Resort,
        latitude: 49.1050,
        longitude: -117.8460,
        elevation_m: 1600.0,
        highways: &["3B"],
    },
    Entry {
        id: "whitewater",
        name: "Whitewater",
        region: "Kootenay",
        kind: LocationKind::Resort,
        latitude: 49.4430,
        longitude: -117.1460,
        elevation_m: 1900.0,
        highways: &["6"],
    },
    Entry {
        id: "fernie",
        name: "Fernie Alpine Resort",
        region: "Lizard Range",
        kind: LocationKind::Resort,
        latitude: 49.4630,
        longitude: -115.0870,
        elevation_m: 1500.0,
        highways: &["3"],
    },
    Entry {
        id: "kimberley",
        name: "Kimberley Alpine Resort",
        region: "Purcells",
        kind: LocationKind::Resort,
        latitude: 49.6870,
        longitude: -115.9990,
        elevation_m: 1600.0,
        highways: &["95A"],
    },
    Entry {
        id: "panorama",
        name: "Panorama",
        region: "Purcells",
        kind: LocationKind::Resort,
        latitude: 50.4600,
        longitude: -116.2380,
        elevation_m: 1600.0,
        highways: &["93", "95"],
    },
    Entry {
        id: "mount-washington",
        name: "Mount Washington",
        region: "Vancouver Island",
        kind: LocationKind::Resort,
        latitude: 49.7420,
        longitude: -125.2880,
        elevation_m: 1300.0,
        highways: &["19"],
    },
    Entry {
        id: "shames-mountain",
        name: "Shames Mountain",
        region: "Northwest Coastal",
        kind: LocationKind::Resort,
        latitude: 54.4880,
        longitude: -128.9590,
        elevation_m: 900.0,
        highways: &["16"],
    },
    Entry {
        id: "duffey-lake",
        name: "Duffey Lake Road",
        region: "South Coast Inland",
        kind: LocationKind::Backcountry,
        latitude: 50.3700,
        longitude: -122.4900,
        elevation_m: 1250.0,
        highways: &["99"],
    },
    Entry {
        id: "rogers-pass",
        name: "Rogers Pass",
        region: "Glacier National Park",
        kind: LocationKind::Pass,
        latitude: 51.3010,
        longitude: -117.5200,
        elevation_m: 1330.0,
        highways: &["1"],
    },
    Entry {
        id: "coquihalla-summit",
        name: "Coquihalla Summit",
        region: "South Coast Inland",
        kind: LocationKind::Pass,
        latitude: 49.6000,
        longitude: -121.0800,
        elevation_m: 1240.0,
        highways: &["5"],
    },
    Entry {
        id: "kootenay-pass",
        name: "Kootenay Pass",
        region: "Kootenay Boundary",
        kind: LocationKind::Pass,
        latitude: 49.0580,
        longitude: -117.0400,
        elevation_m: 1775.0,
        highways: &["3"],
    },
    Entry {
        id: "bear-pass",
        name: "Bear Pass",
        region: "Northwest Coastal",
        kind: LocationKind::Pass,
        latitude: 56.1000,
        longitude: -129.6800,
        elevation_m: 430.0,
        highways: &["37A"],
    },
];

static CATALOG: OnceLock<Vec<Location>> = OnceLock::new();

/// All known locations, in catalog order.
pub fn catalog() -> &'static [Location] {
    CATALOG.get_or_init(|| {
        ENTRIES
            .iter()
            .map(|e| Location {
                id: e.id.to_string(),
                name: e.name.to_string(),
                region: e.region.to_string(),
                kind: e.kind,
                coordinates: Coordinates::new(e.latitude, e.longitude),
                elevation_m: Some(e.elevation_m),
                highways: e.highways.iter().map(|h| h.to_string()).collect(),
            })
            .collect()
    })
}

/// Look up a catalog entry by id, name, or an unambiguous prefix of either.
pub fn find(query: &str) -> Option<&'static Location> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }

    let locations = catalog();
    if let Some(exact) = locations
        .iter()
        .find(|l| l.id == q || l.name.to_lowercase() == q)
    {
        return Some(exact);
    }

    let mut matches = locations
        .iter()
        .filter(|l| l.id.starts_with(&q) || l.name.to_lowercase().starts_with(&q));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Closest catalog entry to `point` and its distance in km.
pub fn nearest_location(point: Coordinates) -> Option<(&'static Location, f64)> {
    nearest(point, catalog())
}

/// Turn user input into a location: a catalog lookup, or `"lat,lon"`.
///
/// Coordinates close to a catalog entry take its name and access highways so
/// road events can still be matched.
pub fn resolve(query: &str) -> Result<Location, WeatherError> {
    if let Some(location) = find(query) {
        return Ok(location.clone());
    }

    let coordinates: Coordinates = query
        .parse()
        .map_err(|_| WeatherError::UnknownLocation(query.trim().to_string()))?;

    let near = nearest_location(coordinates).filter(|(_, d)| *d <= NEAR_MATCH_KM);
    let location = match near {
        Some((base, distance)) => {
            tracing::debug!("{} is {:.1} km from {}", coordinates, distance, base.name);
            Location {
                id: format!("{}@{}", base.id, coordinates),
                name: format!("near {}", base.name),
                region: base.region.clone(),
                kind: LocationKind::Backcountry,
                coordinates,
                elevation_m: None,
                highways: base.highways.clone(),
            }
        }
        None => Location {
            id: coordinates.to_string(),
            name: coordinates.to_string(),
            region: "British Columbia".to_string(),
            kind: LocationKind::Backcountry,
            coordinates,
            elevation_m: None,
            highways: Vec::new(),
        },
    };

    Ok(location)
}
