//! Avalanche Canada forecast API client.

use powderline_core::{AvalancheConfig, HttpConfig, NetworkError};
use powderline_services::{ApiClient, Cached, Coordinates, TtlCache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use crate::error::AvalancheError;
use crate::types::{ApiMetadataEntry, ApiProduct, AvalancheForecast};
use crate::zones::{match_zone, nearest_zone_distance, ForecastZone, ZoneMatch};

/// A forecast together with the zone it was chosen for.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneForecast {
    pub zone: ZoneMatch,
    pub forecast: AvalancheForecast,
}

#[derive(Debug)]
pub struct AvalancheClient {
    api: ApiClient,
    base_url: String,
    language: String,
    max_zone_distance_km: f64,
    zones: TtlCache<String, Vec<ForecastZone>>,
    products: TtlCache<String, Vec<AvalancheForecast>>,
    points: TtlCache<String, AvalancheForecast>,
}

impl AvalancheClient {
    pub fn new(http: &HttpConfig, config: &AvalancheConfig) -> Result<Self, AvalancheError> {
        Ok(Self::with_client(ApiClient::new(http)?, config))
    }

    pub fn with_client(api: ApiClient, config: &AvalancheConfig) -> Self {
        let ttl = config.cache_ttl_minutes;
        Self {
            api,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            max_zone_distance_km: config.max_zone_distance_km,
            zones: TtlCache::with_ttl_minutes("avalanche-zones", ttl),
            products: TtlCache::with_ttl_minutes("avalanche-products", ttl),
            points: TtlCache::with_ttl_minutes("avalanche-point", ttl),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/forecasts/{}/{}", self.base_url, self.language, path)
    }

    /// Forecast regions from the metadata endpoint.
    #[instrument(skip(self), level = "info")]
    pub async fn zones(&self) -> Result<Cached<Vec<ForecastZone>>, AvalancheError> {
        self.zones
            .get_or_fetch(self.language.clone(), || async {
                let raw: Vec<serde_json::Value> =
                    self.api.get_json(&self.url("metadata"), &[]).await?;
                let total = raw.len();
                let (entries, first_error) = decode_each::<ApiMetadataEntry>(raw, "metadata entry");
                let zones: Vec<ForecastZone> =
                    entries.into_iter().filter_map(ApiMetadataEntry::into_zone).collect();

                if zones.is_empty() && total > 0 {
                    return Err(AvalancheError::Parse(first_error.unwrap_or_else(|| {
                        format!("none of {} metadata entries describe a forecast area", total)
                    })));
                }
                tracing::info!("Loaded {} avalanche forecast zones", zones.len());
                Ok::<_, AvalancheError>(zones)
            })
            .await
    }

    /// Every current forecast product.
    #[instrument(skip(self), level = "info")]
    pub async fn products(&self) -> Result<Cached<Vec<AvalancheForecast>>, AvalancheError> {
        self.products
            .get_or_fetch(self.language.clone(), || async {
                let raw: Vec<serde_json::Value> =
                    self.api.get_json(&self.url("products"), &[]).await?;
                let total = raw.len();
                let (products, first_error) = decode_each::<ApiProduct>(raw, "forecast product");

                if let Some(error) = first_error.filter(|_| products.is_empty() && total > 0) {
                    return Err(AvalancheError::Parse(error));
                }
                tracing::info!("Loaded {} avalanche forecasts", products.len());
                Ok::<_, AvalancheError>(
                    products.into_iter().map(AvalancheForecast::from).collect(),
                )
            })
            .await
    }

    /// Forecast covering `point`, as resolved by the API itself.
    #[instrument(skip(self), level = "info")]
    pub async fn forecast_for_point(
        &self,
        point: Coordinates,
    ) -> Result<Cached<AvalancheForecast>, AvalancheError> {
        let key = format!("{:.3},{:.3}", point.latitude, point.longitude);
        self.points
            .get_or_fetch(key, || async {
                let query = [
                    ("lat", format!("{:.4}", point.latitude)),
                    ("long", format!("{:.4}", point.longitude)),
                ];
                match self
                    .api
                    .get_json::<ApiProduct>(&self.url("products/point"), &query)
                    .await
                {
                    Ok(product) => Ok(AvalancheForecast::from(product)),
                    Err(NetworkError::NotFound(_)) => {
                        Err(AvalancheError::ForecastUnavailable(point.to_string()))
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Match `point` to a forecast zone and return that zone's forecast.
    ///
    /// Uses the bulk products list, falling back to the point endpoint when
    /// the list is unavailable or the zone has no product in it. The result
    /// is only as fresh as the older of the zone list and the forecast.
    #[instrument(skip(self), level = "info")]
    pub async fn forecast_near(
        &self,
        point: Coordinates,
    ) -> Result<Cached<ZoneForecast>, AvalancheError> {
        let zones = self.zones().await?;
        let Some(zone) = match_zone(point, &zones.value, self.max_zone_distance_km) else {
            return Err(AvalancheError::NoZoneNearby {
                distance_km: nearest_zone_distance(point, &zones.value),
            });
        };
        tracing::info!(
            "{} matched zone {} ({:.1} km, inside: {})",
            point,
            zone.zone.name,
            zone.distance_km,
            zone.inside
        );

        let listed = match self.products().await {
            Ok(products) => products
                .value
                .iter()
                .find(|f| {
                    f.area_id.as_deref() == Some(zone.zone.id.as_str())
                        || zone.zone.product_id.as_deref() == Some(f.id.as_str())
                })
                .map(|forecast| Cached {
                    value: forecast.clone(),
                    freshness: products.freshness.clone(),
                }),
            Err(e) => {
                tracing::warn!("Forecast list unavailable: {}", e);
                None
            }
        };
        if let Some(cached) = listed {
            return Ok(Cached {
                freshness: zones.freshness.combine(cached.freshness),
                value: ZoneForecast {
                    forecast: cached.value,
                    zone,
                },
            });
        }

        tracing::info!("No product listed for {}, asking the point endpoint", zone.zone.name);
        match self.forecast_for_point(point).await {
            Ok(cached) => Ok(Cached {
                freshness: zones.freshness.combine(cached.freshness),
                value: ZoneForecast {
                    forecast: cached.value,
                    zone,
                },
            }),
            Err(AvalancheError::ForecastUnavailable(_)) => {
                Err(AvalancheError::ForecastUnavailable(zone.zone.name))
            }
            Err(e) => Err(e),
        }
    }
}

/// Decode array entries one at a time, skipping the malformed ones.
///
/// Returns the decoded entries and the first decoding error, if any.
fn decode_each<T: DeserializeOwned>(
    raw: Vec<serde_json::Value>,
    what: &str,
) -> (Vec<T>, Option<String>) {
    let mut first_error = None;
    let decoded = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping malformed {}: {}", what, e);
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                }
                None
            }
        })
        .collect();
    (decoded, first_error)
}
