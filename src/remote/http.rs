//! HTTP transport over `reqwest`.
//!
//! The fetch engine is a synchronous pull loop, so each request blocks on a
//! private tokio runtime owned by the transport.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use tracing::debug;

use super::request::RequestDescriptor;
use super::transport::{Transport, TransportError};

/// Production transport for the remote API.
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokio runtime or HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| TransportError::Connection(format!("failed to start runtime: {e}")))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("memento-mirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            runtime,
            timeout,
        })
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::status(status.as_u16(), &body, retry_after));
        }

        // A body cut off mid-transfer is a network failure, not bad JSON.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Connection(format!("reading response body: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &RequestDescriptor) -> Result<serde_json::Value, TransportError> {
        let url = request.to_url().map_err(TransportError::InvalidUrl)?;
        debug!(url = %request.redacted(), "GET");
        self.runtime.block_on(self.get_json(url))
    }
}

/// Parse a `Retry-After` value given in seconds.
///
/// HTTP-date values are ignored; the fetcher falls back to its own backoff.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}
