//! Open-Meteo forecast provider.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use powderline_core::{HttpConfig, TemperatureUnit, WeatherConfig};
use powderline_services::{ApiClient, Cached, TtlCache};
use serde::Deserialize;
use tracing::instrument;

use crate::powder::PowderScore;
use crate::types::{
    CurrentConditions, DayForecast, HourlyForecast, Location, WeatherCondition, WeatherData,
    WeatherError,
};

const CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
wind_speed_10m,wind_gusts_10m,snowfall,weather_code";
const HOURLY_FIELDS: &str = "temperature_2m,snowfall,precipitation,precipitation_probability,\
wind_speed_10m,freezing_level_height,weather_code";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,snowfall_sum,\
precipitation_sum,precipitation_probability_max,wind_speed_10m_max,wind_gusts_10m_max,\
sunrise,sunset";

/// Hours of history requested so "snow in the last 24 h" can be computed.
const PAST_DAYS: u8 = 1;

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    elevation: Option<f64>,
    current: Option<ApiCurrent>,
    hourly: Option<ApiHourly>,
    daily: Option<ApiDaily>,
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    time: String,
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_gusts_10m: Option<f64>,
    snowfall: Option<f64>,
    weather_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ApiHourly {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    snowfall: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    freezing_level_height: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
}

#[derive(Debug, Deserialize)]
struct ApiDaily {
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    snowfall_sum: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_gusts_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    sunrise: Vec<Option<String>>,
    #[serde(default)]
    sunset: Vec<Option<String>>,
}

#[derive(Debug)]
pub struct WeatherProvider {
    api: ApiClient,
    base_url: String,
    unit: TemperatureUnit,
    forecast_days: u8,
    timezone: String,
    cache: TtlCache<String, WeatherData>,
}

impl WeatherProvider {
    pub fn new(http: &HttpConfig, config: &WeatherConfig) -> Result<Self, WeatherError> {
        Ok(Self::with_client(ApiClient::new(http)?, config))
    }

    pub fn with_client(api: ApiClient, config: &WeatherConfig) -> Self {
        Self {
            api,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            unit: config.temperature_unit,
            forecast_days: config.forecast_days,
            timezone: config.timezone.clone(),
            cache: TtlCache::with_ttl_minutes("weather", config.cache_ttl_minutes),
        }
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    /// Forecast for `location`, served from cache while fresh.
    #[instrument(skip(self, location), fields(location = %location.id), level = "info")]
    pub async fn fetch(&self, location: &Location) -> Result<Cached<WeatherData>, WeatherError> {
        self.cache
            .get_or_fetch(Self::cache_key(location), || self.fetch_uncached(location))
            .await
    }

    /// Forecast for `location` straight from Open-Meteo.
    pub async fn fetch_uncached(&self, location: &Location) -> Result<WeatherData, WeatherError> {
        let url = format!("{}/forecast", self.base_url);
        let response: OpenMeteoResponse = self.api.get_json(&url, &self.query(location)).await?;

        let data = self.convert(location, response)?;
        tracing::info!(
            "Fetched weather for {}: {} hours, {} days",
            location.name,
            data.hourly.len(),
            data.daily.len()
        );
        Ok(data)
    }

    fn cache_key(location: &Location) -> String {
        format!(
            "{:.3},{:.3}@{}",
            location.coordinates.latitude,
            location.coordinates.longitude,
            location.elevation_m.map(|e| e.round() as i64).unwrap_or(-1)
        )
    }

    fn query(&self, location: &Location) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("latitude", format!("{:.4}", location.coordinates.latitude)),
            ("longitude", format!("{:.4}", location.coordinates.longitude)),
            ("current", CURRENT_FIELDS.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("temperature_unit", self.unit.api_value().to_string()),
            ("wind_speed_unit", "kmh".to_string()),
            ("precipitation_unit", "mm".to_string()),
            ("timezone", self.timezone.clone()),
            ("forecast_days", self.forecast_days.to_string()),
            ("past_days", PAST_DAYS.to_string()),
        ];
        if let Some(elevation) = location.elevation_m {
            query.push(("elevation", format!("{:.0}", elevation)));
        }
        query
    }

    fn convert(
        &self,
        location: &Location,
        response: OpenMeteoResponse,
    ) -> Result<WeatherData, WeatherError> {
        let current = response.current.map(convert_current).transpose()?;
        let hourly = match response.hourly {
            Some(h) => convert_hourly(h)?,
            None => Vec::new(),
        };
        let daily = match response.daily {
            Some(d) => convert_daily(d, self.unit)?,
            None => Vec::new(),
        };

        Ok(WeatherData {
            location: location.clone(),
            model_elevation_m: response.elevation,
            unit: self.unit,
            current,
            hourly,
            daily,
            fetched_at: Utc::now(),
        })
    }
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, WeatherError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .map_err(|e| WeatherError::Parse(format!("bad timestamp {:?}: {}", s, e)))
}

fn parse_date(s: &str) -> Result<NaiveDate, WeatherError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| WeatherError::Parse(format!("bad date {:?}: {}", s, e)))
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    parse_datetime(s).ok().map(|dt| dt.time())
}

/// A series aligned with `len` timestamps. Missing series become all-`None`.
fn aligned<T: Clone>(
    values: Vec<Option<T>>,
    len: usize,
    name: &str,
) -> Result<Vec<Option<T>>, WeatherError> {
    if values.is_empty() {
        return Ok(vec![None; len]);
    }
    if values.len() != len {
        return Err(WeatherError::Parse(format!(
            "{} has {} values for {} timestamps",
            name,
            values.len(),
            len
        )));
    }
    Ok(values)
}

fn percent(v: Option<f64>) -> Option<u8> {
    v.map(|p| p.round().clamp(0.0, 100.0) as u8)
}

fn convert_current(c: ApiCurrent) -> Result<CurrentConditions, WeatherError> {
    Ok(CurrentConditions {
        observed_at: parse_datetime(&c.time)?,
        temperature: c.temperature_2m,
        feels_like: c.apparent_temperature,
        humidity: percent(c.relative_humidity_2m),
        wind_speed: c.wind_speed_10m,
        wind_gusts: c.wind_gusts_10m,
        snowfall_cm: c.snowfall.unwrap_or(0.0),
        weather_code: c.weather_code,
        condition: c
            .weather_code
            .map(WeatherCondition::from_wmo_code)
            .unwrap_or_default(),
    })
}

fn convert_hourly(h: ApiHourly) -> Result<Vec<HourlyForecast>, WeatherError> {
    let len = h.time.len();
    let temperature = aligned(h.temperature_2m, len, "hourly.temperature_2m")?;
    let snowfall = aligned(h.snowfall, len, "hourly.snowfall")?;
    let precipitation = aligned(h.precipitation, len, "hourly.precipitation")?;
    let probability = aligned(
        h.precipitation_probability,
        len,
        "hourly.precipitation_probability",
    )?;
    let wind = aligned(h.wind_speed_10m, len, "hourly.wind_speed_10m")?;
    let freezing = aligned(h.freezing_level_height, len, "hourly.freezing_level_height")?;
    let codes = aligned(h.weather_code, len, "hourly.weather_code")?;

    h.time
        .iter()
        .enumerate()
        .map(|(i, time)| {
            Ok(HourlyForecast {
                time: parse_datetime(time)?,
                temperature: temperature[i],
                snowfall_cm: snowfall[i].unwrap_or(0.0),
                precipitation_mm: precipitation[i].unwrap_or(0.0),
                precipitation_chance: percent(probability[i]),
                wind_speed: wind[i],
                freezing_level_m: freezing[i],
                condition: codes[i]
                    .map(WeatherCondition::from_wmo_code)
                    .unwrap_or_default(),
            })
        })
        .collect()
}

fn convert_daily(d: ApiDaily, unit: TemperatureUnit) -> Result<Vec<DayForecast>, WeatherError> {
    let len = d.time.len();
    let codes = aligned(d.weather_code, len, "daily.weather_code")?;
    let high = aligned(d.temperature_2m_max, len, "daily.temperature_2m_max")?;
    let low = aligned(d.temperature_2m_min, len, "daily.temperature_2m_min")?;
    let snowfall = aligned(d.snowfall_sum, len, "daily.snowfall_sum")?;
    let precipitation = aligned(d.precipitation_sum, len, "daily.precipitation_sum")?;
    let probability = aligned(
        d.precipitation_probability_max,
        len,
        "daily.precipitation_probability_max",
    )?;
    let wind = aligned(d.wind_speed_10m_max, len, "daily.wind_speed_10m_max")?;
    let gusts = aligned(d.wind_gusts_10m_max, len, "daily.wind_gusts_10m_max")?;
    let sunrise = aligned(d.sunrise, len, "daily.sunrise")?;
    let sunset = aligned(d.sunset, len, "daily.sunset")?;

    d.time
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let snowfall_cm = snowfall[i].unwrap_or(0.0);
            Ok(DayForecast {
                date: parse_date(date)?,
                high: high[i],
                low: low[i],
                snowfall_cm,
                precipitation_mm: precipitation[i].unwrap_or(0.0),
                precipitation_chance: percent(probability[i]),
                wind_speed_max: wind[i],
                wind_gusts_max: gusts[i],
                condition: codes[i]
                    .map(WeatherCondition::from_wmo_code)
                    .unwrap_or_default(),
                sunrise: sunrise[i].as_deref().and_then(parse_clock),
                sunset: sunset[i].as_deref().and_then(parse_clock),
                powder: PowderScore::for_day(snowfall_cm, high[i], low[i], wind[i], unit),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::location::find;
    use powderline_core::NetworkError;
    use powderline_services::{Freshness, RetryConfig};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, ttl_minutes: u64) -> WeatherProvider {
        let config = WeatherConfig {
            base_url: server.uri(),
            cache_ttl_minutes: ttl_minutes,
            ..WeatherConfig::default()
        };
        WeatherProvider::with_client(ApiClient::with_retry_config(RetryConfig::none()), &config)
    }

    fn sample_body() -> serde_json::Value {
        let times: Vec<String> = (0..48)
            .map(|h| format!("2025-01-{:02}T{:02}:00", 14 + h / 24, h % 24))
            .collect();
        // 1 cm/h for the 12 hours after 10:00 on the 15th
        let snowfall: Vec<f64> = (0..48)
            .map(|h| if (34..46).contains(&h) { 1.0 } else { 0.0 })
            .collect();
        serde_json::json!({
            "latitude": 50.1,
            "longitude": -122.95,
            "elevation": 1480.0,
            "timezone": "America/Vancouver",
            "current": {
                "time": "2025-01-15T10:00",
                "temperature_2m": -7.5,
                "apparent_temperature": -13.0,
                "relative_humidity_2m": 88,
                "wind_speed_10m": 12.0,
                "wind_gusts_10m": 30.0,
                "snowfall": 0.4,
                "weather_code": 73
            },
            "hourly": {
                "time": times,
                "temperature_2m": vec![-9.0; 48],
                "snowfall": snowfall,
                "precipitation": vec![1.0; 48],
                "precipitation_probability": vec![80; 48],
                "wind_speed_10m": vec![15.0; 48],
                "freezing_level_height": vec![900.0; 48],
                "weather_code": vec![73; 48]
            },
            "daily": {
                "time": ["2025-01-14", "2025-01-15", "2025-01-16"],
                "weather_code": [3, 73, 75],
                "temperature_2m_max": [-2.0, -6.0, -8.0],
                "temperature_2m_min": [-8.0, -12.0, -14.0],
                "snowfall_sum": [0.0, 12.0, 27.0],
                "precipitation_sum": [0.0, 9.0, 20.0],
                "precipitation_probability_max": [10, 90, 100],
                "wind_speed_10m_max": [10.0, 20.0, 55.0],
                "wind_gusts_10m_max": [25.0, 40.0, 80.0],
                "sunrise": ["2025-01-14T07:58", "2025-01-15T07:57", "2025-01-16T07:56"],
                "sunset": ["2025-01-14T16:34", "2025-01-15T16:36", null]
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_parses_forecast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .and(query_param("latitude", "50.1150"))
            .and(query_param("elevation", "1500"))
            .and(query_param("wind_speed_unit", "kmh"))
            .and(query_param("timezone", "America/Vancouver"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let location = find("whistler-blackcomb").unwrap();
        let data = provider(&server, 30).fetch(location).await.unwrap().value;

        assert_eq!(data.model_elevation_m, Some(1480.0));
        let current = data.current.as_ref().unwrap();
        assert_eq!(current.condition, WeatherCondition::Snow);
        assert_eq!(current.humidity, Some(88));
        assert_eq!(data.hourly.len(), 48);
        assert_eq!(data.daily.len(), 3);

        let tomorrow = &data.daily[2];
        assert_eq!(tomorrow.condition, WeatherCondition::HeavySnow);
        assert!(tomorrow.sunset.is_none());
        // 27 cm -> 9.0, mean -11 °C -> +1, 55 km/h -> -2
        assert_eq!(tomorrow.powder.score, 8.0);
    }

    #[tokio::test]
    async fn test_snowfall_windows_around_observation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let location = find("whistler-blackcomb").unwrap();
        let data = provider(&server, 30).fetch_uncached(location).await.unwrap();
        let now = data.reference_time().unwrap();

        assert_eq!(data.snowfall_next_hours(now, 24), 12.0);
        assert_eq!(data.snowfall_past_hours(now, 24), 0.0);
        assert_eq!(data.upcoming_days().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server, 30);
        let location = find("whistler-blackcomb").unwrap();
        let first = provider.fetch(location).await.unwrap();
        let second = provider.fetch(location).await.unwrap();

        assert_eq!(first.freshness, Freshness::Live);
        assert!(matches!(second.freshness, Freshness::Fresh { .. }));
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_forecast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = provider(&server, 0);
        let location = find("whistler-blackcomb").unwrap();

        let first = provider.fetch(location).await.unwrap();
        assert_eq!(first.freshness, Freshness::Live);

        let second = provider.fetch(location).await.unwrap();
        assert_eq!(second.value.hourly.len(), 48);
        assert!(second.freshness.is_stale());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let config = WeatherConfig {
            cache_ttl_minutes: u64::MAX / 2,
            ..WeatherConfig::default()
        };
        let provider = WeatherProvider::with_client(
            ApiClient::with_retry_config(RetryConfig::none()),
            &config,
        );
        assert_eq!(provider.cache.ttl(), std::time::Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn test_mismatched_series_is_parse_error() {
        let server = MockServer::start().await;
        let mut body = sample_body();
        body["hourly"]["snowfall"] = serde_json::json!([1.0, 2.0]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let location = find("sun-peaks").unwrap();
        let result = provider(&server, 30).fetch_uncached(location).await;
        assert!(matches!(result, Err(WeatherError::Parse(msg)) if msg.contains("hourly.snowfall")));
    }

    #[tokio::test]
    async fn test_null_values_are_tolerated() {
        let server = MockServer::start().await;
        let mut body = sample_body();
        body["daily"]["temperature_2m_max"] = serde_json::json!([null, null, null]);
        body["daily"]["temperature_2m_min"] = serde_json::json!([null, null, null]);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let location = find("sun-peaks").unwrap();
        let data = provider(&server, 30).fetch_uncached(location).await.unwrap();
        assert!(data.daily[1].high.is_none());
        // 12 cm, no temperature, 20 km/h
        assert_eq!(data.daily[1].powder.score, 4.0);
    }

    #[tokio::test]
    async fn test_server_error_surfaces_as_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": true,
                "reason": "Latitude must be in range of -90 to 90°."
            })))
            .mount(&server)
            .await;

        let location = find("sun-peaks").unwrap();
        let result = provider(&server, 30).fetch(location).await;
        assert!(matches!(
            result,
            Err(WeatherError::Network(NetworkError::ServerError { status: 400, .. }))
        ));
    }
}
