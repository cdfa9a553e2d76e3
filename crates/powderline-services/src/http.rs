//! JSON-over-HTTP client shared by all providers.

use std::time::Duration;

use powderline_core::{HttpConfig, NetworkError, ReqwestErrorExt};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::retry::{with_retry, RetryConfig};

/// Longest response snippet kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    retry: RetryConfig,
}

impl ApiClient {
    pub fn new(http: &HttpConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(http.user_agent.clone())
            .build()
            .map_err(ReqwestErrorExt::into_network_error)?;

        Ok(Self {
            client,
            retry: RetryConfig::from(http),
        })
    }

    /// Client with explicit retry settings, mostly for tests against mock servers.
    pub fn with_retry_config(retry: RetryConfig) -> Self {
        Self {
            client: Client::new(),
            retry,
        }
    }

    /// GET `url` with `query` parameters and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, NetworkError> {
        tracing::debug!("GET {} {:?}", url, query);

        let response = with_retry(&self.retry, || self.client.get(url).query(query).send())
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        if status == StatusCode::NOT_FOUND {
            return Err(NetworkError::NotFound(url.to_string()));
        }

        if !status.is_success() {
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!("Failed to decode response from {}: {}", url, e);
            NetworkError::InvalidResponse(format!("{}: {}", url, e))
        })
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
