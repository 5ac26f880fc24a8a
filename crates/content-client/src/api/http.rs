//! HTTP transport for JSON upstreams.
//!
//! The transport is the seam between acquisition policy and the network:
//! the dispatcher and the fetch race only ever see [`Transport`], so tests
//! can drive them with scripted responses.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use shared::AcquisitionError;
use std::time::Duration;
use tracing::{debug, warn};

/// Single GET returning a JSON document
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, AcquisitionError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport; `timeout` bounds a single request end to end
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value, AcquisitionError> {
        let shown = redact(url);
        debug!(url = %shown, "Making API request");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %shown, error = %e, "Request error");
            if e.is_timeout() {
                AcquisitionError::Timeout {
                    url: shown.clone(),
                    after: self.timeout,
                }
            } else {
                AcquisitionError::unavailable(shown.clone(), e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(url = %shown, "Rate limited by server");
            return Err(AcquisitionError::RateLimited { url: shown });
        }
        if !status.is_success() {
            warn!(url = %shown, status = %status, "Request failed");
            return Err(AcquisitionError::unavailable(shown, format!("HTTP {}", status)));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);
        if !is_json {
            warn!(url = %shown, "Response is not JSON");
            return Err(AcquisitionError::unavailable(shown, "non-JSON content type"));
        }

        let data = response.json::<Value>().await.map_err(|e| {
            warn!(url = %shown, error = %e, "Failed to parse response");
            AcquisitionError::unavailable(shown.clone(), format!("invalid JSON body: {}", e))
        })?;

        debug!(url = %shown, "Request successful");
        Ok(data)
    }
}

/// Strip credentials from a URL before it reaches logs or error values
pub fn redact(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw) else {
        return raw.to_string();
    };
    if !parsed.query_pairs().any(|(key, _)| key == "api_key") {
        return raw.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "api_key")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    parsed.to_string()
}
