//! Pagination-agnostic page fetcher.
//!
//! [`Fetcher`] is a pull iterator over the pages of one listing. It issues
//! requests through a [`Transport`], retries transient failures with capped
//! exponential backoff, lets the pagination adapter pick the next request,
//! and records why iteration ended so callers can tell a complete traversal
//! from a truncated one.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::pagination::{Continuation, Next, PaginationScheme, detect_and_advance, extract_items};
use crate::remote::{RequestDescriptor, Transport, TransportError};

/// Default page ceiling per run.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Backoff settings for transient request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without sleeping.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// `min(max_delay, base_delay * 2^attempt)`, or the server's
    /// `Retry-After` hint capped at `max_delay` when one was given.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_delay);
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Per-run fetch limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Stop after this many pages even if more remain.
    pub max_pages: usize,
    pub retry: RetryPolicy,
    /// Pause between successive page requests.
    pub page_delay: Duration,
    /// Parameter name a continuation token is resubmitted under.
    pub token_param: Option<String>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
            page_delay: Duration::ZERO,
            token_param: None,
        }
    }
}

/// One fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number within the run.
    pub index: usize,
    pub items: Vec<Value>,
    pub continuation: Continuation,
    pub scheme: Option<PaginationScheme>,
    /// The request that produced this page.
    pub request: RequestDescriptor,
}

/// Why iteration stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchEnd {
    /// The server signalled the last page.
    Exhausted,
    /// Stopped without proof of exhaustion.
    Ambiguous { reason: String },
    /// The page ceiling was hit with pages remaining.
    CeilingReached { pages: usize },
    /// A request failed or the consumer stopped early.
    Aborted,
}

impl FetchEnd {
    /// Whether every page of the collection was seen.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

impl std::fmt::Display for FetchEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted => write!(f, "exhausted"),
            Self::Ambiguous { reason } => write!(f, "ambiguous ({reason})"),
            Self::CeilingReached { pages } => write!(f, "page ceiling reached after {pages} pages"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// A page could not be fetched.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("page {page} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        page: usize,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("page {page} rejected: {source}")]
    Rejected {
        page: usize,
        #[source]
        source: TransportError,
    },
}

impl FetchError {
    /// 1-based page number that failed.
    #[must_use]
    pub const fn page(&self) -> usize {
        match self {
            Self::RetriesExhausted { page, .. } | Self::Rejected { page, .. } => *page,
        }
    }

    /// The last transport error seen.
    #[must_use]
    pub const fn transport_error(&self) -> &TransportError {
        match self {
            Self::RetriesExhausted { source, .. } | Self::Rejected { source, .. } => source,
        }
    }
}

/// Pull iterator over the pages of one listing.
pub struct Fetcher<T: Transport> {
    transport: T,
    policy: FetchPolicy,
    next: Option<RequestDescriptor>,
    scheme: Option<PaginationScheme>,
    pages: usize,
    end: Option<FetchEnd>,
}

impl<T: Transport> Fetcher<T> {
    /// Start a traversal at `first`.
    pub fn new(transport: T, first: RequestDescriptor, policy: FetchPolicy) -> Self {
        Self {
            transport,
            policy,
            next: Some(first),
            scheme: None,
            pages: 0,
            end: None,
        }
    }

    /// Why iteration stopped; [`FetchEnd::Aborted`] until it has.
    #[must_use]
    pub fn end(&self) -> FetchEnd {
        self.end.clone().unwrap_or(FetchEnd::Aborted)
    }

    /// Scheme detected so far.
    #[must_use]
    pub const fn scheme(&self) -> Option<PaginationScheme> {
        self.scheme
    }

    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.pages
    }

    fn get_with_retry(&self, request: &RequestDescriptor, page: usize) -> Result<Value, FetchError> {
        let retry = &self.policy.retry;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.transport.get(request) {
                Ok(body) => return Ok(body),
                Err(source) if !source.is_retryable() => {
                    return Err(FetchError::Rejected { page, source });
                }
                Err(source) if attempts >= retry.max_attempts.max(1) => {
                    return Err(FetchError::RetriesExhausted {
                        page,
                        attempts,
                        source,
                    });
                }
                Err(source) => {
                    let delay = retry.delay_for(attempts - 1, source.retry_after());
                    warn!(
                        page,
                        attempt = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %source,
                        "Transient failure, retrying"
                    );
                    thread::sleep(delay);
                }
            }
        }
    }
}

impl<T: Transport> Iterator for Fetcher<T> {
    type Item = Result<Page, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end.is_some() {
            return None;
        }
        let request = self.next.take()?;

        if self.pages > 0 && !self.policy.page_delay.is_zero() {
            thread::sleep(self.policy.page_delay);
        }

        let index = self.pages + 1;
        debug!(page = index, url = %request.redacted(), "Fetching page");
        let body = match self.get_with_retry(&request, index) {
            Ok(body) => body,
            Err(e) => {
                self.end = Some(FetchEnd::Aborted);
                return Some(Err(e));
            }
        };
        self.pages = index;

        let items = extract_items(&body);
        let advance = detect_and_advance(
            &request,
            &body,
            items.len(),
            self.scheme,
            self.policy.token_param.as_deref(),
        );
        if self.scheme.is_none() {
            if let Some(scheme) = advance.scheme {
                debug!(%scheme, "Pagination scheme detected");
            }
        }
        self.scheme = advance.scheme.or(self.scheme);

        match advance.next {
            Next::Request(next) if self.pages >= self.policy.max_pages => {
                warn!(pages = self.pages, next = %next.redacted(), "Page ceiling reached");
                self.end = Some(FetchEnd::CeilingReached { pages: self.pages });
            }
            Next::Request(next) => self.next = Some(next),
            Next::Exhausted => self.end = Some(FetchEnd::Exhausted),
            Next::Ambiguous(reason) => {
                warn!(page = index, %reason, "Stopping without proof of exhaustion");
                self.end = Some(FetchEnd::Ambiguous { reason });
            }
        }

        Some(Ok(Page {
            index,
            items,
            continuation: advance.continuation,
            scheme: self.scheme,
            request,
        }))
    }
}

/// Fetch every page into memory.
///
/// # Errors
///
/// Returns the first page failure; pages fetched before it are discarded.
pub fn fetch_all<T: Transport>(
    transport: T,
    first: RequestDescriptor,
    policy: FetchPolicy,
) -> Result<(Vec<Page>, FetchEnd), FetchError> {
    let mut fetcher = Fetcher::new(transport, first, policy);
    let pages = fetcher.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok((pages, fetcher.end()))
}
