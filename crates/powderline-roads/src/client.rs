//! DriveBC Open511 events client.

use powderline_core::{HttpConfig, RoadsConfig};
use powderline_services::{ApiClient, BoundingBox, Cached, Coordinates, TtlCache};
use tracing::instrument;

use crate::error::RoadError;
use crate::filter::{EventFilter, RankedEvent};
use crate::types::{ApiEvent, ApiEventsPage, RoadEvent};

/// Events requested per page.
const PAGE_SIZE: usize = 200;
/// Stop following pagination after this many pages.
const MAX_PAGES: usize = 10;

#[derive(Debug)]
pub struct RoadEventsClient {
    api: ApiClient,
    base_url: String,
    filter: EventFilter,
    cache: TtlCache<String, Vec<RoadEvent>>,
}

impl RoadEventsClient {
    pub fn new(http: &HttpConfig, config: &RoadsConfig) -> Result<Self, RoadError> {
        Ok(Self::with_client(ApiClient::new(http)?, config))
    }

    pub fn with_client(api: ApiClient, config: &RoadsConfig) -> Self {
        Self {
            api,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            filter: EventFilter::from(config),
            cache: TtlCache::with_ttl_minutes("road-events", config.cache_ttl_minutes),
        }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// All active events inside `bbox`, following pagination.
    #[instrument(skip(self), level = "info")]
    pub async fn active_events(
        &self,
        bbox: BoundingBox,
    ) -> Result<Cached<Vec<RoadEvent>>, RoadError> {
        self.cache
            .get_or_fetch(bbox.to_query(), || self.fetch_all(bbox))
            .await
    }

    /// Events relevant to a location at `point` reached via `highways`,
    /// ranked most important first.
    #[instrument(skip(self), level = "info")]
    pub async fn relevant_events(
        &self,
        point: Coordinates,
        highways: &[String],
    ) -> Result<Cached<Vec<RankedEvent>>, RoadError> {
        let bbox = BoundingBox::around(point, self.filter.search_radius_km());
        let events = self.active_events(bbox).await?;
        Ok(events.map(|events| self.filter.apply(&events, point, highways)))
    }

    async fn fetch_all(&self, bbox: BoundingBox) -> Result<Vec<RoadEvent>, RoadError> {
        let url = format!("{}/events", self.base_url);
        let mut events = Vec::new();
        let mut offset = 0;

        for page_number in 0..MAX_PAGES {
            let query = [
                ("format", "json".to_string()),
                ("status", "ACTIVE".to_string()),
                ("bbox", bbox.to_query()),
                ("limit", PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ];
            let page: ApiEventsPage = self.api.get_json(&url, &query).await?;
            let received = page.events.len();
            events.extend(decode_events(page.events)?);

            let next = page.pagination.filter(|p| p.next_url.is_some());
            match next {
                Some(pagination) if received > 0 => {
                    offset = pagination.offset.max(offset) + received;
                }
                _ => {
                    tracing::info!(
                        "Fetched {} road events in {} page(s)",
                        events.len(),
                        page_number + 1
                    );
                    return Ok(events);
                }
            }
        }

        tracing::warn!(
            "Stopped after {} pages with {} road events",
            MAX_PAGES,
            events.len()
        );
        Ok(events)
    }
}

/// Decode a page of raw events, skipping malformed ones.
fn decode_events(raw: Vec<serde_json::Value>) -> Result<Vec<RoadEvent>, RoadError> {
    let total = raw.len();
    let mut first_error = None;
    let events: Vec<RoadEvent> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<ApiEvent>(value) {
            Ok(event) => Some(RoadEvent::from(event)),
            Err(e) => {
                tracing::warn!("Skipping malformed road event: {}", e);
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                }
                None
            }
        })
        .collect();

    match first_error {
        Some(error) if events.is_empty() && total > 0 => Err(RoadError::Parse(error)),
        _ => Ok(events),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use powderline_services::{Freshness, RetryConfig};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RoadEventsClient {
        let config = RoadsConfig {
            base_url: server.uri(),
            ..RoadsConfig::default()
        };
        RoadEventsClient::with_client(ApiClient::with_retry_config(RetryConfig::none()), &config)
    }

    fn raw_event(id: &str, lat: f64, lon: f64, severity: &str, road: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "headline": "INCIDENT",
            "description": "Vehicle incident.",
            "status": "ACTIVE",
            "event_type": "INCIDENT",
            "event_subtypes": ["HAZARD"],
            "severity": severity,
            "updated": "2025-01-15T07:30:00-08:00",
            "geography": { "type": "Point", "coordinates": [lon, lat] },
            "roads": [{ "name": road }]
        })
    }

    fn whistler_box() -> BoundingBox {
        BoundingBox::around(Coordinates::new(50.115, -122.9486), 150.0)
    }

    #[tokio::test]
    async fn test_active_events_follows_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(query_param("status", "ACTIVE"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [raw_event("e1", 50.0, -123.0, "MAJOR", "Highway 99")],
                "pagination": { "offset": 0, "next_url": "https://example/events?offset=1" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(query_param("offset", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [raw_event("e2", 49.7, -123.15, "MINOR", "Highway 99")],
                "pagination": { "offset": 1, "next_url": null }
            })))
            .mount(&server)
            .await;

        let events = client(&server).active_events(whistler_box()).await.unwrap();
        let ids: Vec<&str> = events.value.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
        assert_eq!(events.freshness, Freshness::Live);
    }

    #[tokio::test]
    async fn test_malformed_events_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [
                    { "headline": "no id" },
                    raw_event("ok", 50.0, -123.0, "MAJOR", "Highway 99")
                ],
                "pagination": { "offset": 0, "next_url": null }
            })))
            .mount(&server)
            .await;

        let events = client(&server).active_events(whistler_box()).await.unwrap();
        assert_eq!(events.value.len(), 1);
    }

    #[tokio::test]
    async fn test_all_malformed_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [{ "headline": "no id" }]
            })))
            .mount(&server)
            .await;

        let result = client(&server).active_events(whistler_box()).await;
        assert!(matches!(result, Err(RoadError::Parse(_))));
    }

    #[tokio::test]
    async fn test_relevant_events_ranked_and_filtered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [
                    raw_event("minor", 50.1, -122.95, "MINOR", "Highway 99"),
                    raw_event("moderate", 50.05, -122.97, "MODERATE", "Highway 99"),
                    raw_event("major-far", 49.32, -123.10, "MAJOR", "Highway 99"),
                    raw_event("major-off-route", 49.32, -123.10, "MAJOR", "Highway 1")
                ],
                "pagination": { "offset": 0, "next_url": null }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let whistler = Coordinates::new(50.115, -122.9486);
        let highways = vec!["99".to_string()];
        let ranked = client.relevant_events(whistler, &highways).await.unwrap();
        let ids: Vec<&str> = ranked.value.iter().map(|r| r.event.id.as_str()).collect();
        assert_eq!(ids, vec!["major-far", "moderate"]);

        // Second call is served from cache
        let again = client.relevant_events(whistler, &highways).await.unwrap();
        assert!(matches!(again.freshness, Freshness::Fresh { .. }));
    }
}
