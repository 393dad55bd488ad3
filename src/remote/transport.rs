//! Transport trait and transport errors.
//!
//! The fetch engine never talks to the network directly; it issues
//! [`RequestDescriptor`]s through a [`Transport`]. Production code uses
//! [`HttpTransport`](super::HttpTransport); tests use a simulated remote.

use std::time::Duration;

use super::request::RequestDescriptor;

/// Maximum characters of an error body kept in a [`TransportError`].
const MAX_ERROR_BODY: usize = 512;

/// A synchronous request/response channel to the remote API.
///
/// Implementations return the decoded JSON body for 2xx responses and a
/// [`TransportError`] for everything else.
pub trait Transport {
    /// Issue one GET request.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` for connection failures, non-2xx statuses
    /// and undecodable bodies.
    fn get(&self, request: &RequestDescriptor) -> Result<serde_json::Value, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, request: &RequestDescriptor) -> Result<serde_json::Value, TransportError> {
        (**self).get(request)
    }
}

/// Errors from a single request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request or its body transfer failed (DNS, TLS, timeout, reset).
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Server-provided `Retry-After` hint.
        retry_after: Option<Duration>,
    },

    /// The body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The request descriptor could not be turned into a URL.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Build a status error, truncating long bodies.
    #[must_use]
    pub fn status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let body = if body.chars().count() > MAX_ERROR_BODY {
            let mut cut: String = body.chars().take(MAX_ERROR_BODY).collect();
            cut.push('…');
            cut
        } else {
            body.to_string()
        };
        Self::Status {
            status,
            body,
            retry_after,
        }
    }

    /// Transient failures: connection errors, 429 and 5xx.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }

    /// HTTP status, when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server `Retry-After` hint, when present.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
