//! Scheme detection and next-request construction.
//!
//! [`detect_and_advance`] looks at one decoded response and decides how to
//! ask for the next page. Detection runs in a fixed priority order so that
//! unambiguous markers win over generic ones:
//!
//! 1. continuation token fields
//! 2. a `next` / `next_url` / `links.next` URL
//! 3. `offset` + `total` counters
//! 4. `page` + `pages` counters
//!
//! After the first page the scheme is pinned and only its own marker is
//! consulted. The adapter performs no I/O.

use reqwest::Url;
use serde_json::Value;

use super::scheme::{Continuation, PaginationScheme};
use crate::remote::RequestDescriptor;

/// Body fields holding an opaque continuation token, in priority order.
pub const TOKEN_FIELDS: [&str; 4] = ["nextPageToken", "pageToken", "cursor", "continuation"];

/// Body fields holding a next-page URL, in priority order.
pub const NEXT_URL_FIELDS: [&str; 2] = ["next", "next_url"];

/// Body fields holding the total page count for the page/pages scheme.
pub const PAGE_COUNT_FIELDS: [&str; 3] = ["pages", "totalPages", "total_pages"];

/// Body fields holding the item list, in priority order.
pub const ITEM_FIELDS: [&str; 4] = ["entries", "items", "data", "results"];

/// Query parameters that carry pagination state and must not leak from one
/// request into the next when following a server-provided URL.
const CONTINUATION_PARAMS: [&str; 5] = ["pageToken", "cursor", "continuation", "offset", "page"];

/// What to do after a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Issue this request next.
    Request(RequestDescriptor),
    /// The collection has been fully traversed.
    Exhausted,
    /// Iteration stopped without proof of exhaustion.
    Ambiguous(String),
}

/// Result of [`detect_and_advance`].
#[derive(Debug, Clone)]
pub struct Advance {
    pub next: Next,
    /// Scheme in force after this page (`None` while undetected).
    pub scheme: Option<PaginationScheme>,
    /// Marker read from this page.
    pub continuation: Continuation,
}

/// Request parameter used to resubmit a token found in `field`.
#[must_use]
pub fn token_param_for(field: &str) -> &'static str {
    match field {
        "continuation" => "continuation",
        _ => "pageToken",
    }
}

/// Inspect one response and produce the next request descriptor.
///
/// `item_count` is the number of items the page carried, `prior` the scheme
/// pinned by earlier pages, and `token_param` an optional override for the
/// parameter name a continuation token is resubmitted under.
#[must_use]
pub fn detect_and_advance(
    request: &RequestDescriptor,
    body: &Value,
    item_count: usize,
    prior: Option<PaginationScheme>,
    token_param: Option<&str>,
) -> Advance {
    let pinned = prior.filter(|s| *s != PaginationScheme::Unpaged);
    let continuation = match pinned {
        Some(scheme) => read_marker(scheme, body),
        None => detect(body),
    };
    let scheme = pinned.or_else(|| continuation.scheme());

    let next = match &continuation {
        // A pinned scheme whose marker disappeared has run out of pages.
        Continuation::None if pinned.is_some() => Next::Exhausted,
        Continuation::None => final_or_ambiguous(request, item_count),
        Continuation::Token { field, value } => {
            let param = token_param.unwrap_or_else(|| token_param_for(field));
            let mut next = request.clone();
            next.set_param(param, value.clone());
            Next::Request(next)
        }
        Continuation::Url { url } => match merge_next_url(request, url, body, token_param) {
            Ok(next) => Next::Request(next),
            Err(reason) => Next::Ambiguous(format!("unusable next URL {url}: {reason}")),
        },
        Continuation::Offset { offset, total } => {
            let next_offset = offset.saturating_add(item_count as u64);
            if item_count == 0 || next_offset >= *total {
                Next::Exhausted
            } else {
                let mut next = request.clone();
                next.set_param("offset", next_offset.to_string());
                Next::Request(next)
            }
        }
        Continuation::Page { page, pages } => {
            if item_count == 0 || page >= pages {
                Next::Exhausted
            } else {
                let mut next = request.clone();
                next.set_param("page", page.saturating_add(1).to_string());
                Next::Request(next)
            }
        }
    };

    let scheme = match (&next, scheme) {
        (Next::Exhausted, None) => Some(PaginationScheme::Unpaged),
        (_, scheme) => scheme,
    };

    let next = match next {
        Next::Request(mut req) => {
            req.scheme = scheme;
            if req.same_request(request) {
                Next::Ambiguous(format!(
                    "{} continuation did not advance",
                    scheme.map_or_else(|| "unknown".to_string(), |s| s.to_string())
                ))
            } else {
                Next::Request(req)
            }
        }
        other => other,
    };

    Advance {
        next,
        scheme,
        continuation,
    }
}

/// Pull the item list out of a response body.
///
/// A top-level array is itself the list; otherwise the first of
/// [`ITEM_FIELDS`] present is used, flattening keyed objects to their values.
#[must_use]
pub fn extract_items(body: &Value) -> Vec<Value> {
    if let Value::Array(items) = body {
        return items.clone();
    }
    for field in ITEM_FIELDS {
        match body.get(field) {
            Some(Value::Array(items)) => return items.clone(),
            Some(Value::Object(map)) => return map.values().cloned().collect(),
            _ => {}
        }
    }
    Vec::new()
}

/// Run full detection in priority order.
#[must_use]
pub fn detect(body: &Value) -> Continuation {
    [
        find_token(body),
        find_next_url(body),
        find_offset(body),
        find_page(body),
    ]
    .into_iter()
    .find(|c| *c != Continuation::None)
    .unwrap_or(Continuation::None)
}

/// Read only the marker of an already pinned scheme.
fn read_marker(scheme: PaginationScheme, body: &Value) -> Continuation {
    match scheme {
        PaginationScheme::Token => find_token(body),
        PaginationScheme::NextUrl => find_next_url(body),
        PaginationScheme::OffsetTotal => find_offset(body),
        PaginationScheme::PageCount => find_page(body),
        PaginationScheme::Unpaged => Continuation::None,
    }
}

fn final_or_ambiguous(request: &RequestDescriptor, item_count: usize) -> Next {
    match request.limit() {
        Some(limit) if item_count < limit => Next::Exhausted,
        Some(limit) => Next::Ambiguous(format!(
            "page returned {item_count} items (limit {limit}) without a continuation marker"
        )),
        None if item_count == 0 => Next::Exhausted,
        None => Next::Ambiguous(format!(
            "page returned {item_count} items with no limit requested and no continuation marker"
        )),
    }
}

fn find_token(body: &Value) -> Continuation {
    TOKEN_FIELDS
        .iter()
        .find_map(|field| {
            body.get(*field).and_then(token_text).map(|value| Continuation::Token {
                field: (*field).to_string(),
                value,
            })
        })
        .unwrap_or(Continuation::None)
}

fn find_next_url(body: &Value) -> Continuation {
    let direct = NEXT_URL_FIELDS
        .iter()
        .find_map(|field| body.get(*field).and_then(non_empty_str));
    let linked = || {
        body.get("links")
            .and_then(|links| links.get("next"))
            .and_then(|next| non_empty_str(next).or_else(|| next.get("href").and_then(non_empty_str)))
    };
    direct
        .or_else(linked)
        .map_or(Continuation::None, |url| Continuation::Url { url })
}

fn find_offset(body: &Value) -> Continuation {
    match (
        body.get("offset").and_then(counter),
        body.get("total").and_then(counter),
    ) {
        (Some(offset), Some(total)) => Continuation::Offset { offset, total },
        _ => Continuation::None,
    }
}

fn find_page(body: &Value) -> Continuation {
    let page = body.get("page").and_then(counter);
    let pages = PAGE_COUNT_FIELDS
        .iter()
        .find_map(|field| body.get(*field).and_then(counter));
    match (page, pages) {
        (Some(page), Some(pages)) => Continuation::Page { page, pages },
        _ => Continuation::None,
    }
}

/// Resolve a next-page URL against the request that produced it.
///
/// Absolute URLs are used as-is, relative ones are joined onto the request
/// URL, and parameter-only ones (`?start=50`, `start=50`) replace the query
/// of the endpoint. Any parameter of the original request the new URL omits
/// is re-attached (auth token, limit, since-filter), and a continuation token
/// present in the body but missing from the URL is added back.
///
/// A URL on another origin is refused so the auth token never leaves the
/// configured API host.
fn merge_next_url(
    request: &RequestDescriptor,
    next: &str,
    body: &Value,
    token_param: Option<&str>,
) -> Result<RequestDescriptor, String> {
    let next = next.trim();
    let current = request.to_url()?;

    let merged = if let Ok(absolute) = Url::parse(next) {
        absolute
    } else if next.starts_with('?') || (!next.contains('/') && !next.contains('?') && next.contains('=')) {
        let mut endpoint = Url::parse(&request.endpoint).map_err(|e| e.to_string())?;
        endpoint.set_query(Some(next.trim_start_matches('?')));
        endpoint
    } else {
        current.join(next).map_err(|e| e.to_string())?
    };

    if merged.origin() != current.origin() {
        return Err(format!(
            "points at {} instead of {}",
            merged.origin().ascii_serialization(),
            current.origin().ascii_serialization()
        ));
    }

    let mut resolved = RequestDescriptor::from_url(&merged);
    for (key, value) in &request.query {
        let stale = CONTINUATION_PARAMS.contains(&key.as_str()) || token_param == Some(key.as_str());
        if !stale && resolved.param(key).is_none() {
            resolved.query.push((key.clone(), value.clone()));
        }
    }

    if let Continuation::Token { field, value } = find_token(body) {
        let param = token_param.unwrap_or_else(|| token_param_for(&field));
        if resolved.param(param).is_none() {
            resolved.set_param(param, value);
        }
    }

    Ok(resolved)
}

fn token_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn counter(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
