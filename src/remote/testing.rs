//! In-memory remote for tests.
//!
//! [`MockRemote`] serves one library's entries in any supported pagination
//! shape, filters by since-parameters it is told it supports, checks the
//! auth token, and can inject status failures on chosen calls. Every request
//! it receives is recorded for assertions.

use std::cell::RefCell;

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::{Value, json};

use super::request::RequestDescriptor;
use super::transport::{Transport, TransportError};
use super::{entries_endpoint, libraries_endpoint};

pub const MOCK_API_URL: &str = "http://mock.test/v1";
pub const MOCK_LIBRARY: &str = "lib";

/// Entries endpoint of the mock library.
#[must_use]
pub fn mock_endpoint() -> String {
    entries_endpoint(MOCK_API_URL, MOCK_LIBRARY)
}

/// Pagination convention the mock answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `nextPageToken`, resubmitted as `pageToken`.
    Token,
    /// `continuation`, resubmitted under the same name.
    Continuation,
    /// Absolute `next` URL that omits the auth token and filters.
    NextAbsolute,
    /// Relative `next_url` (`entries?start=N`).
    NextRelative,
    /// Parameter-only `next` (`?start=N`).
    NextParamsOnly,
    /// `links.next.href` with an absolute path.
    LinksNext,
    /// `offset` + `total`.
    OffsetTotal,
    /// `page` + `pages`.
    PageCount,
    /// Bare array of at most `limit` items, no markers.
    Unpaged,
    /// Always answers with the same token.
    StuckToken,
}

struct FailRule {
    from: usize,
    count: usize,
    status: u16,
}

/// Simulated remote serving one library.
pub struct MockRemote {
    shape: Shape,
    default_limit: usize,
    required_token: Option<String>,
    since_params: Vec<String>,
    items: RefCell<Vec<Value>>,
    failures: RefCell<Vec<FailRule>>,
    requests: RefCell<Vec<RequestDescriptor>>,
}

impl MockRemote {
    #[must_use]
    pub fn new(shape: Shape, items: Vec<Value>) -> Self {
        Self {
            shape,
            default_limit: 25,
            required_token: None,
            since_params: Vec::new(),
            items: RefCell::new(items),
            failures: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Reject requests whose `token` parameter differs with 401.
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.required_token = Some(token.to_string());
        self
    }

    /// Accept these since-parameters and filter on `modifiedTime >= value`.
    #[must_use]
    pub fn with_since_params(mut self, params: &[&str]) -> Self {
        self.since_params = params.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Fail `count` calls starting at call index `from` (0-based) with `status`.
    pub fn fail_calls(&self, from: usize, count: usize, status: u16) {
        self.failures.borrow_mut().push(FailRule { from, count, status });
    }

    /// Replace the served entries.
    pub fn set_items(&self, items: Vec<Value>) {
        *self.items.borrow_mut() = items;
    }

    /// Append or replace (by `id`) one entry.
    pub fn upsert_item(&self, item: Value) {
        let mut items = self.items.borrow_mut();
        match items.iter_mut().find(|existing| existing["id"] == item["id"]) {
            Some(slot) => *slot = item,
            None => items.push(item),
        }
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.borrow().clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    fn injected_failure(&self, call: usize) -> Option<TransportError> {
        self.failures
            .borrow()
            .iter()
            .find(|rule| call >= rule.from && call - rule.from < rule.count)
            .map(|rule| TransportError::status(rule.status, "injected failure", None))
    }

    fn visible_items(&self, request: &RequestDescriptor) -> Result<Vec<Value>, TransportError> {
        let items = self.items.borrow().clone();
        let filter = request
            .query
            .iter()
            .find(|(k, _)| k.ends_with("After") || k.ends_with("Since"));
        let Some((param, value)) = filter else {
            return Ok(items);
        };
        if !self.since_params.iter().any(|p| p == param) {
            return Err(TransportError::status(400, &format!("unknown filter {param}"), None));
        }
        let since = DateTime::parse_from_rfc3339(value)
            .map_err(|_| TransportError::status(400, &format!("bad {param} value"), None))?;
        Ok(items
            .into_iter()
            .filter(|item| {
                item.get("modifiedTime")
                    .and_then(Value::as_str)
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .is_some_and(|t| t >= since)
            })
            .collect())
    }

    fn page(&self, request: &RequestDescriptor, items: &[Value]) -> Value {
        let limit = request.limit().unwrap_or(self.default_limit).max(1);
        let index = |param: &str, prefix: &str| {
            request
                .param(param)
                .and_then(|v| v.strip_prefix(prefix).unwrap_or(v).parse::<usize>().ok())
                .unwrap_or(0)
        };
        let start = match self.shape {
            Shape::Token | Shape::StuckToken => index("pageToken", "t"),
            Shape::Continuation => index("continuation", "c"),
            Shape::NextAbsolute | Shape::NextRelative | Shape::NextParamsOnly | Shape::LinksNext => {
                index("start", "")
            }
            Shape::OffsetTotal => index("offset", ""),
            Shape::PageCount => index("page", "").max(1).saturating_sub(1) * limit,
            Shape::Unpaged => 0,
        }
        .min(items.len());
        let end = (start + limit).min(items.len());
        let slice: Vec<Value> = items[start..end].to_vec();
        let more = end < items.len();

        match self.shape {
            Shape::Token => {
                let mut body = json!({"entries": slice});
                if more {
                    body["nextPageToken"] = json!(format!("t{end}"));
                }
                body
            }
            Shape::StuckToken => json!({"entries": slice, "nextPageToken": "t0"}),
            Shape::Continuation => {
                let mut body = json!({"items": slice});
                if more {
                    body["continuation"] = json!(format!("c{end}"));
                }
                body
            }
            Shape::NextAbsolute => {
                let mut body = json!({"entries": slice});
                if more {
                    body["next"] = json!(format!("{}?limit={limit}&start={end}", mock_endpoint()));
                }
                body
            }
            Shape::NextRelative => {
                let mut body = json!({"data": slice});
                if more {
                    body["next_url"] = json!(format!("entries?start={end}"));
                }
                body
            }
            Shape::NextParamsOnly => {
                let mut body = json!({"entries": slice});
                if more {
                    body["next"] = json!(format!("?start={end}"));
                }
                body
            }
            Shape::LinksNext => {
                let mut body = json!({"entries": slice});
                if more {
                    body["links"] = json!({
                        "next": {"href": format!("/v1/libraries/{MOCK_LIBRARY}/entries?start={end}")}
                    });
                }
                body
            }
            Shape::OffsetTotal => json!({"entries": slice, "offset": start, "total": items.len()}),
            Shape::PageCount => {
                let pages = items.len().div_ceil(limit).max(1);
                json!({"entries": slice, "page": start / limit + 1, "pages": pages})
            }
            Shape::Unpaged => Value::Array(slice),
        }
    }
}

impl Transport for MockRemote {
    fn get(&self, request: &RequestDescriptor) -> Result<Value, TransportError> {
        let call = self.request_count();
        self.requests.borrow_mut().push(request.clone());

        if let Some(err) = self.injected_failure(call) {
            return Err(err);
        }
        if let Some(token) = &self.required_token {
            if request.param("token") != Some(token.as_str()) {
                return Err(TransportError::status(401, "invalid token", None));
            }
        }
        if request.endpoint == libraries_endpoint(MOCK_API_URL) {
            return Ok(json!({"libraries": [{"id": MOCK_LIBRARY, "name": "Mock Library"}]}));
        }
        if request.endpoint != mock_endpoint() {
            return Err(TransportError::status(404, "no such library", None));
        }

        let items = self.visible_items(request)?;
        Ok(self.page(request, &items))
    }
}

/// One remote entry with a `modifiedTime` stamp.
#[must_use]
pub fn entry(id: &str, modified: &str) -> Value {
    json!({
        "id": id,
        "modifiedTime": modified,
        "fields": [{"name": "title", "value": format!("Entry {id}")}]
    })
}

/// `count` entries `e000..`, one minute apart from 2024-05-01T10:00:00Z.
#[must_use]
pub fn numbered_entries(count: usize) -> Vec<Value> {
    let base = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default();
    (0..count)
        .map(|i| {
            let stamp = base + ChronoDuration::minutes(i64::try_from(i).unwrap_or(0));
            entry(&format!("e{i:03}"), &stamp.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        })
        .collect()
}
