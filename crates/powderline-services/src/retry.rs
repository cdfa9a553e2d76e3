//! Exponential backoff for flaky upstream APIs.
//!
//! A request is repeated when the transport timed out or could not connect,
//! or when the server answered 408, 429 or 5xx. A `Retry-After` header given
//! in seconds replaces the computed delay, capped at `max_delay`.

use std::future::Future;
use std::time::Duration;

use powderline_core::HttpConfig;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first request
    pub max_retries: u32,
    /// Delay before the first retry; doubles after that
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for RetryConfig {
    fn from(http: &HttpConfig) -> Self {
        Self::new(
            http.max_retries,
            http.initial_retry_delay_ms,
            http.max_retry_delay_ms,
        )
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Wait before retry `retry` (1 for the first retry).
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// Whether the server asked to be tried again.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT
        )
}

/// Whether a transport failure is worth another attempt.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }
    if error.is_builder() || error.is_decode() {
        return false;
    }
    error.status().is_some_and(is_transient_status)
}

fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Run `send` until it yields a final response or the retries run out.
///
/// Transient statuses are returned as-is once retries are exhausted so the
/// caller can map them to an error with the response body.
pub async fn with_retry<F, Fut>(config: &RetryConfig, send: F) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let attempts = config.max_retries.saturating_add(1);
    let mut retry: u32 = 0;

    loop {
        let result = send().await;
        let attempt = retry.saturating_add(1);
        let out_of_retries = retry >= config.max_retries;

        let wait = match &result {
            Ok(response) if is_transient_status(response.status()) && !out_of_retries => {
                tracing::warn!(
                    "Upstream answered {} (attempt {}/{})",
                    response.status(),
                    attempt,
                    attempts
                );
                let hinted = retry_after(response).map(|d| d.min(config.max_delay));
                Some(hinted.unwrap_or_else(|| config.backoff(attempt)))
            }
            Err(e) if is_transient_error(e) && !out_of_retries => {
                tracing::warn!("Request failed (attempt {}/{}): {}", attempt, attempts, e);
                Some(config.backoff(attempt))
            }
            Err(e) => {
                if retry > 0 {
                    tracing::error!("Giving up after {} attempts: {}", attempt, e);
                }
                None
            }
            Ok(response) => {
                if retry > 0 {
                    if response.status().is_success() {
                        tracing::info!("Request succeeded after {} retries", retry);
                    } else {
                        tracing::error!(
                            "Giving up after {} attempts: upstream answered {}",
                            attempt,
                            response.status()
                        );
                    }
                }
                None
            }
        };
        let Some(wait) = wait else {
            return result;
        };

        retry = attempt;
        tracing::debug!("Retrying in {:?}", wait);
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_follows_http_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::new(10, 100, 1000);
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(800));
        assert_eq!(config.backoff(5), Duration::from_millis(1000));
        assert_eq!(config.backoff(200), Duration::from_millis(1000));
    }

    #[test]
    fn test_from_http_config() {
        let http = HttpConfig {
            max_retries: 5,
            initial_retry_delay_ms: 10,
            max_retry_delay_ms: 20,
            ..HttpConfig::default()
        };
        let config = RetryConfig::from(&http);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff(3), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_max_retries_at_type_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = RetryConfig::new(u32::MAX, 1, 10);
        assert_eq!(config.backoff(u32::MAX), Duration::from_millis(10));

        let client = reqwest::Client::new();
        let url = format!("{}/events", server.uri());
        let response = with_retry(&config, || client.get(&url).send()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_transient_statuses() {
        for status in [500, 502, 503, 504, 429, 408] {
            assert!(is_transient_status(StatusCode::from_u16(status).unwrap()), "{}", status);
        }
        for status in [200, 400, 401, 403, 404] {
            assert!(!is_transient_status(StatusCode::from_u16(status).unwrap()), "{}", status);
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/events", server.uri());
        let response = with_retry(&RetryConfig::new(3, 1, 5), || client.get(&url).send())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_after_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/forecast", server.uri());
        let started = std::time::Instant::now();
        let response = with_retry(&RetryConfig::new(1, 1, 10), || client.get(&url).send())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_client_errors_are_final() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/missing", server.uri());
        let response = with_retry(&RetryConfig::new(3, 1, 5), || client.get(&url).send())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/down", server.uri());
        let response = with_retry(&RetryConfig::new(2, 1, 5), || client.get(&url).send())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }
}
