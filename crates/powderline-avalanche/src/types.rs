//! Avalanche Canada wire format and the normalized forecast built from it.

use chrono::{DateTime, NaiveDate, Utc};
use powderline_services::{BoundingBox, Coordinates};
use serde::{Deserialize, Serialize};

use crate::danger::{DangerRating, DayRatings, ElevationBand};
use crate::zones::ForecastZone;

// ---------------------------------------------------------------------------
// API types (Avalanche Canada forecast API)
// ---------------------------------------------------------------------------

/// `{ "value": "considerable", "display": "3 - Considerable" }`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiValue {
    pub value: Option<String>,
    pub display: Option<String>,
}

impl ApiValue {
    fn text(&self) -> Option<String> {
        self.display.clone().or_else(|| self.value.clone())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMetadataEntry {
    pub product: Option<ApiMetadataProduct>,
    pub area: Option<ApiArea>,
    /// `[lon, lat]`
    pub centroid: Option<[f64; 2]>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMetadataProduct {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiArea {
    pub id: String,
    pub name: String,
    /// `[west, south, east, north]`
    pub bbox: Option<[f64; 4]>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiProduct {
    pub id: String,
    pub url: Option<String>,
    pub area: Option<ApiArea>,
    pub report: Option<ApiReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiReport {
    pub title: Option<String>,
    pub timezone: Option<String>,
    pub date_issued: Option<String>,
    pub valid_until: Option<String>,
    pub highlights: Option<String>,
    pub confidence: Option<ApiConfidence>,
    #[serde(default)]
    pub danger_ratings: Vec<ApiDangerDay>,
    #[serde(default)]
    pub problems: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiConfidence {
    pub rating: Option<ApiValue>,
    #[serde(default)]
    pub statements: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDangerDay {
    pub date: Option<ApiValue>,
    pub ratings: ApiBandRatings,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiBandRatings {
    pub alp: Option<ApiBandRating>,
    pub tln: Option<ApiBandRating>,
    pub btl: Option<ApiBandRating>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiBandRating {
    pub rating: Option<ApiValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiProblem {
    #[serde(rename = "type")]
    pub kind: Option<ApiValue>,
    pub comment: Option<String>,
    pub data: Option<ApiProblemData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiProblemData {
    #[serde(default)]
    pub elevations: Vec<ApiValue>,
    #[serde(default)]
    pub aspects: Vec<ApiValue>,
    pub likelihood: Option<ApiValue>,
    pub expected_size: Option<ApiExpectedSize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiExpectedSize {
    pub min: Option<serde_json::Value>,
    pub max: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvalancheProblem {
    /// e.g. "Wind slab"
    pub kind: String,
    pub elevations: Vec<ElevationBand>,
    pub aspects: Vec<String>,
    pub likelihood: Option<String>,
    /// Destructive size range, e.g. `(1.0, 2.0)`
    pub expected_size: Option<(f64, f64)>,
    pub comment: Option<String>,
}

/// A published forecast, normalized for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvalancheForecast {
    pub id: String,
    pub title: String,
    pub area_id: Option<String>,
    pub area_name: String,
    pub issued: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    /// Plain text, HTML removed
    pub highlights: Option<String>,
    pub confidence: Option<String>,
    pub days: Vec<DayRatings>,
    pub problems: Vec<AvalancheProblem>,
    pub url: Option<String>,
}

impl AvalancheForecast {
    pub fn today(&self) -> Option<&DayRatings> {
        self.days.first()
    }

    /// Worst rating today across all bands.
    pub fn highest_today(&self) -> DangerRating {
        self.today()
            .map(DayRatings::highest)
            .unwrap_or(DangerRating::NoRating)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|v| v < now)
    }
}

impl ApiMetadataEntry {
    /// `None` for entries without an area or centroid.
    pub(crate) fn into_zone(self) -> Option<ForecastZone> {
        let area = self.area?;
        let centroid = Coordinates::from_lon_lat(self.centroid?);
        if let Some(kind) = self.product.as_ref().and_then(|p| p.kind.as_deref()) {
            tracing::debug!("Zone {} publishes {} products", area.name, kind);
        }
        Some(ForecastZone {
            id: area.id,
            name: area.name,
            centroid,
            bbox: area.bbox.map(BoundingBox::from_array),
            product_id: self.product.and_then(|p| p.id),
            url: self.url,
        })
    }
}

impl From<ApiProduct> for AvalancheForecast {
    fn from(product: ApiProduct) -> Self {
        let area_name = product
            .area
            .as_ref()
            .map(|a| a.name.clone())
            .unwrap_or_default();
        let area_id = product.area.map(|a| a.id);

        let Some(report) = product.report else {
            return Self {
                id: product.id,
                title: area_name.clone(),
                area_id,
                area_name,
                issued: None,
                valid_until: None,
                timezone: None,
                highlights: None,
                confidence: None,
                days: Vec::new(),
                problems: Vec::new(),
                url: product.url,
            };
        };

        let confidence = report.confidence.and_then(|c| {
            c.rating
                .and_then(|r| r.text())
                .or_else(|| c.statements.first().cloned())
        });

        Self {
            id: product.id,
            title: report.title.unwrap_or_else(|| area_name.clone()),
            area_id,
            area_name,
            issued: report.date_issued.as_deref().and_then(parse_timestamp),
            valid_until: report.valid_until.as_deref().and_then(parse_timestamp),
            timezone: report.timezone,
            highlights: report
                .highlights
                .as_deref()
                .map(strip_html)
                .filter(|h| !h.is_empty()),
            confidence,
            days: report.danger_ratings.into_iter().map(convert_day).collect(),
            problems: report.problems.into_iter().map(convert_problem).collect(),
            url: product.url,
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Dates arrive as full timestamps; the calendar day is the leading part.
fn parse_day(s: &str) -> Option<NaiveDate> {
    s.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

fn band_rating(band: Option<ApiBandRating>) -> DangerRating {
    let Some(value) = band.and_then(|b| b.rating) else {
        return DangerRating::NoRating;
    };
    value
        .value
        .as_deref()
        .and_then(DangerRating::parse)
        .or_else(|| value.display.as_deref().and_then(DangerRating::parse))
        .unwrap_or_else(|| {
            tracing::debug!("Unrecognised danger rating {:?}", value);
            DangerRating::NoRating
        })
}

fn convert_day(day: ApiDangerDay) -> DayRatings {
    let (date, label) = match day.date {
        Some(d) => (
            d.value.as_deref().and_then(parse_day),
            d.display.unwrap_or_default(),
        ),
        None => (None, String::new()),
    };
    DayRatings {
        date,
        label,
        alpine: band_rating(day.ratings.alp),
        treeline: band_rating(day.ratings.tln),
        below_treeline: band_rating(day.ratings.btl),
    }
}

fn size_value(v: Option<&serde_json::Value>) -> Option<f64> {
    match v? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn convert_problem(problem: ApiProblem) -> AvalancheProblem {
    let kind = problem
        .kind
        .and_then(|k| k.text())
        .unwrap_or_else(|| "Unknown problem".to_string());

    let (elevations, aspects, likelihood, expected_size) = match problem.data {
        Some(data) => {
            let elevations = data
                .elevations
                .iter()
                .filter_map(|e| e.value.as_deref().and_then(ElevationBand::from_code))
                .collect();
            let aspects = data
                .aspects
                .iter()
                .filter_map(|a| a.value.clone().or_else(|| a.display.clone()))
                .map(|a| a.to_uppercase())
                .collect();
            let likelihood = data.likelihood.and_then(|l| l.text());
            let expected_size = data.expected_size.and_then(|s| {
                Some((size_value(s.min.as_ref())?, size_value(s.max.as_ref())?))
            });
            (elevations, aspects, likelihood, expected_size)
        }
        None => (Vec::new(), Vec::new(), None, None),
    };

    AvalancheProblem {
        kind,
        elevations,
        aspects,
        likelihood,
        expected_size,
        comment: problem
            .comment
            .as_deref()
            .map(strip_html)
            .filter(|c| !c.is_empty()),
    }
}

/// Remove tags and common entities from forecast HTML and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&rsquo;", "'")
        .replace("&amp;", "&");

    let mut out = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    for p in [" .", " ,", " ;", " :", " !", " ?"] {
        out = out.replace(p, &p[1..]);
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_strip_html() {
        let html = "<p>Wind slabs <strong>remain</strong> reactive.</p>\n<p>Avoid &amp; retreat</p>";
        assert_eq!(
            strip_html(html),
            "Wind slabs remain reactive. Avoid & retreat"
        );
        assert_eq!(strip_html("plain"), "plain");
        assert_eq!(strip_html("<br/>"), "");
    }

    #[test]
    fn test_product_conversion() {
        let json = serde_json::json!({
            "id": "prod-1",
            "type": "avalanche",
            "url": "https://avalanche.ca/forecasts/prod-1",
            "area": { "id": "area-1", "name": "Sea-to-Sky", "bbox": [-123.6, 49.6, -122.2, 50.8] },
            "report": {
                "title": "Sea-to-Sky",
                "timezone": "America/Vancouver",
                "dateIssued": "2025-01-15T00:00:00Z",
                "validUntil": "2025-01-16T00:00:00Z",
                "highlights": "<p>Storm slabs building.</p>",
                "confidence": {
                    "rating": { "value": "moderate", "display": "Moderate" },
                    "statements": []
                },
                "dangerRatings": [{
                    "date": { "value": "2025-01-15T00:00:00Z", "display": "Wednesday" },
                    "ratings": {
                        "alp": {
                            "display": "Alpine",
                            "rating": { "value": "high", "display": "4 - High" }
                        },
                        "tln": {
                            "display": "Treeline",
                            "rating": { "value": "considerable", "display": "3 - Considerable" }
                        },
                        "btl": {
                            "display": "Below Treeline",
                            "rating": { "value": "noRating", "display": "No Rating" }
                        }
                    }
                }],
                "problems": [{
                    "type": { "value": "stormSlab", "display": "Storm slab" },
                    "comment": "<p>Up to 40 cm of new snow.</p>",
                    "data": {
                        "elevations": [
                            { "value": "alp", "display": "Alpine" },
                            { "value": "tln", "display": "Treeline" }
                        ],
                        "aspects": [
                            { "value": "n", "display": "North" },
                            { "value": "ne", "display": "Northeast" }
                        ],
                        "likelihood": { "value": "likely", "display": "Likely" },
                        "expectedSize": { "min": "1.0", "max": "2.5" }
                    }
                }]
            }
        });
        let product: ApiProduct = serde_json::from_value(json).unwrap();
        let forecast = AvalancheForecast::from(product);

        assert_eq!(forecast.area_id.as_deref(), Some("area-1"));
        assert_eq!(forecast.highlights.as_deref(), Some("Storm slabs building."));
        assert_eq!(forecast.confidence.as_deref(), Some("Moderate"));
        assert_eq!(forecast.highest_today(), DangerRating::High);

        let today = forecast.today().unwrap();
        assert_eq!(today.date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(today.label, "Wednesday");
        assert_eq!(today.below_treeline, DangerRating::NoRating);

        let problem = &forecast.problems[0];
        assert_eq!(problem.kind, "Storm slab");
        assert_eq!(problem.elevations, vec![ElevationBand::Alpine, ElevationBand::Treeline]);
        assert_eq!(problem.aspects, vec!["N", "NE"]);
        assert_eq!(problem.expected_size, Some((1.0, 2.5)));

        let noon = DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(!forecast.is_expired_at(noon));
    }

    #[test]
    fn test_product_without_report() {
        let json = serde_json::json!({
            "id": "offseason",
            "type": "offseason",
            "area": { "id": "area-1", "name": "Sea-to-Sky" }
        });
        let forecast = AvalancheForecast::from(serde_json::from_value::<ApiProduct>(json).unwrap());
        assert_eq!(forecast.title, "Sea-to-Sky");
        assert!(forecast.days.is_empty());
        assert_eq!(forecast.highest_today(), DangerRating::NoRating);
    }

    #[test]
    fn test_metadata_entry_to_zone() {
        let json = serde_json::json!({
            "product": { "id": "prod-1", "type": "avalanche" },
            "area": { "id": "area-1", "name": "Sea-to-Sky", "bbox": [-123.6, 49.6, -122.2, 50.8] },
            "centroid": [-122.9, 50.1],
            "url": "https://avalanche.ca/forecasts/prod-1"
        });
        let entry: ApiMetadataEntry = serde_json::from_value(json).unwrap();
        let zone = entry.into_zone().unwrap();
        assert_eq!(zone.id, "area-1");
        assert_eq!(zone.centroid, Coordinates::new(50.1, -122.9));
        assert_eq!(zone.product_id.as_deref(), Some("prod-1"));

        let bare: ApiMetadataEntry = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(bare.into_zone().is_none());
    }
}
