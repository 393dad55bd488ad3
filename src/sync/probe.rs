//! Read-only diagnostics for one collection.
//!
//! A probe issues a single unpaginated request and reports what the
//! fetcher would see. With capability checks it also sends each since-filter
//! candidate (the configured one first) with a far-future value; a server
//! that honors the filter answers with no items. Nothing is written to the
//! store.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::controller::entries_request;
use super::item::MirrorItem;
use super::types::SyncStrategy;
use crate::config::{CollectionConfig, RemoteSettings};
use crate::pagination::{Continuation, PaginationScheme, detect, extract_items};
use crate::remote::{Transport, TransportError};

/// Since-filter candidates sent by a capability probe.
pub const PROBE_CAPABILITIES: [&str; 2] = ["updatedAfter", "createdAfter"];

/// Since value no real item can be newer than.
pub const FAR_FUTURE: &str = "2999-01-01T00:00:00Z";

/// Number of identifiers and timestamps sampled from the first page.
const SAMPLE_SIZE: usize = 5;

/// Result of sending one since-filter candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityCheck {
    pub param: String,
    pub honored: bool,
    pub detail: String,
}

/// What one unpaginated request revealed about a collection.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub collection: String,
    /// Request URL with the token masked.
    pub request: String,
    /// `None` when the page met the limit without a marker.
    pub scheme: Option<PaginationScheme>,
    pub continuation: Continuation,
    pub item_count: usize,
    pub limit: usize,
    pub limit_met: bool,
    pub sample_ids: Vec<String>,
    pub sample_timestamps: Vec<String>,
    /// Items without a usable identifier.
    pub skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<CapabilityCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_strategy: Option<SyncStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Probe a collection.
///
/// # Errors
///
/// Returns the transport error of the unfiltered request. Failures of
/// capability requests are reported in the checks instead.
pub fn probe_collection<T: Transport + ?Sized>(
    transport: &T,
    remote: &RemoteSettings,
    collection: &CollectionConfig,
    limit: usize,
    include_fields: bool,
    check_capabilities: bool,
) -> Result<ProbeReport, TransportError> {
    let limit = limit.max(1);
    let request = entries_request(
        &remote.api_url,
        remote.token.as_deref(),
        &collection.id,
        limit,
        include_fields,
    );
    debug!(url = %request.redacted(), "Probing collection");
    let body = transport.get(&request)?;

    let items = extract_items(&body);
    let continuation = detect(&body);
    let limit_met = items.len() >= limit;
    let scheme = continuation.scheme().or_else(|| {
        if limit_met {
            None
        } else {
            Some(PaginationScheme::Unpaged)
        }
    });

    let mut report = ProbeReport {
        collection: collection.id.clone(),
        request: request.redacted(),
        scheme,
        continuation,
        item_count: items.len(),
        limit,
        limit_met,
        sample_ids: Vec::new(),
        sample_timestamps: Vec::new(),
        skipped: 0,
        capabilities: Vec::new(),
        suggested_strategy: None,
        suggestion: None,
    };
    sample(&mut report, items, collection.tempo_col.as_deref());

    if check_capabilities {
        let base = report.item_count;
        let configured = collection.since_param.as_deref();
        report.capabilities = capability_candidates(configured)
            .into_iter()
            .map(|param| {
                let filtered = request.clone().with_param(param, FAR_FUTURE);
                check_capability(param, base, transport.get(&filtered))
            })
            .collect();
        let (strategy, suggestion) = suggest(&report.capabilities, configured);
        report.suggested_strategy = Some(strategy);
        report.suggestion = Some(suggestion);
    }
    Ok(report)
}

fn sample(report: &mut ProbeReport, items: Vec<Value>, tempo_col: Option<&str>) {
    for raw in items {
        let Some(item) = MirrorItem::from_raw(raw, tempo_col) else {
            report.skipped += 1;
            continue;
        };
        if report.sample_ids.len() < SAMPLE_SIZE {
            report.sample_ids.push(item.id.clone());
            if let Some(ts) = item.modified_at_text() {
                report.sample_timestamps.push(ts);
            }
        }
    }
}

/// The configured since parameter first, then the stock candidates.
fn capability_candidates(configured: Option<&str>) -> Vec<&str> {
    let mut candidates: Vec<&str> = configured.into_iter().collect();
    candidates.extend(PROBE_CAPABILITIES.iter().filter(|p| Some(**p) != configured));
    candidates
}

fn check_capability(
    param: &str,
    base_count: usize,
    response: Result<Value, TransportError>,
) -> CapabilityCheck {
    let (honored, detail) = match response {
        Err(e) => (false, format!("rejected: {e}")),
        Ok(_) if base_count == 0 => (
            false,
            "inconclusive: unfiltered request returned no items".to_string(),
        ),
        Ok(body) => match extract_items(&body).len() {
            0 => (true, "honored".to_string()),
            n => (false, format!("ignored: returned {n} items")),
        },
    };
    CapabilityCheck {
        param: param.to_string(),
        honored,
        detail,
    }
}

fn suggest(checks: &[CapabilityCheck], configured: Option<&str>) -> (SyncStrategy, String) {
    match checks.iter().find(|c| c.honored) {
        Some(check) if configured == Some(check.param.as_str()) => (
            SyncStrategy::Incremental,
            format!("the configured since_param \"{}\" is honored", check.param),
        ),
        Some(check) => (
            SyncStrategy::Incremental,
            format!("add \"supports\": [\"{}\"] to the collection config", check.param),
        ),
        None => (
            SyncStrategy::Full,
            "no since-filter was honored; use \"sync\": \"full\"".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::{MOCK_API_URL, MOCK_LIBRARY, MockRemote, Shape, numbered_entries};
    use serde_json::json;
    use std::time::Duration;

    fn settings() -> RemoteSettings {
        RemoteSettings {
            api_url: MOCK_API_URL.to_string(),
            token: Some("secret".to_string()),
            timeout: Duration::from_secs(1),
        }
    }

    fn probe(remote: &MockRemote, limit: usize, capabilities: bool) -> ProbeReport {
        probe_collection(remote, &settings(), &CollectionConfig::new(MOCK_LIBRARY), limit, true, capabilities)
            .unwrap()
    }

    #[test]
    fn test_probe_token_shape() {
        let remote = MockRemote::new(Shape::Token, numbered_entries(30));
        let report = probe(&remote, 10, false);

        assert_eq!(remote.request_count(), 1);
        assert_eq!(report.scheme, Some(PaginationScheme::Token));
        assert_eq!(report.item_count, 10);
        assert!(report.limit_met);
        assert_eq!(report.sample_ids, vec!["e000", "e001", "e002", "e003", "e004"]);
        assert_eq!(report.sample_timestamps[1], "2024-05-01T10:01:00Z");
        assert!(report.capabilities.is_empty());
        assert!(report.suggested_strategy.is_none());
        assert!(!report.request.contains("secret"));
    }

    #[test]
    fn test_probe_small_unpaged_collection() {
        let remote = MockRemote::new(Shape::Unpaged, numbered_entries(3));
        let report = probe(&remote, 10, false);
        assert_eq!(report.scheme, Some(PaginationScheme::Unpaged));
        assert!(!report.limit_met);
        assert_eq!(report.continuation, Continuation::None);
    }

    #[test]
    fn test_probe_full_page_without_marker_is_unknown() {
        let remote = MockRemote::new(Shape::Unpaged, numbered_entries(10));
        let report = probe(&remote, 10, false);
        assert_eq!(report.scheme, None);
        assert!(report.limit_met);
    }

    #[test]
    fn test_probe_counts_items_without_id() {
        let remote = MockRemote::new(Shape::Token, vec![json!({"title": "orphan"}), json!({"id": "x"})]);
        let report = probe(&remote, 10, false);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.sample_ids, vec!["x"]);
        assert!(report.sample_timestamps.is_empty());
    }

    #[test]
    fn test_capabilities_detect_honored_filter() {
        let remote = MockRemote::new(Shape::Token, numbered_entries(4)).with_since_params(&["updatedAfter"]);
        let report = probe(&remote, 10, true);

        assert_eq!(remote.request_count(), 3);
        assert_eq!(remote.requests()[1].param("updatedAfter"), Some(FAR_FUTURE));
        let updated = &report.capabilities[0];
        assert!(updated.honored);
        let created = &report.capabilities[1];
        assert!(!created.honored);
        assert!(created.detail.starts_with("rejected"));
        assert_eq!(report.suggested_strategy, Some(SyncStrategy::Incremental));
        assert!(report.suggestion.unwrap().contains("updatedAfter"));
    }

    #[test]
    fn test_capabilities_on_empty_collection_are_inconclusive() {
        let remote = MockRemote::new(Shape::Token, Vec::new()).with_since_params(&["updatedAfter", "createdAfter"]);
        let report = probe(&remote, 10, true);
        assert!(report.capabilities.iter().all(|c| !c.honored));
        assert!(report.capabilities[0].detail.starts_with("inconclusive"));
        assert_eq!(report.suggested_strategy, Some(SyncStrategy::Full));
    }

    #[test]
    fn test_capabilities_include_configured_since_param() {
        let remote = MockRemote::new(Shape::Token, numbered_entries(4)).with_since_params(&["changedSince"]);
        let collection = CollectionConfig {
            since_param: Some("changedSince".to_string()),
            ..CollectionConfig::new(MOCK_LIBRARY)
        };
        let report = probe_collection(&remote, &settings(), &collection, 10, true, true).unwrap();

        assert_eq!(remote.request_count(), 4);
        let params: Vec<&str> = report.capabilities.iter().map(|c| c.param.as_str()).collect();
        assert_eq!(params, vec!["changedSince", "updatedAfter", "createdAfter"]);
        assert!(report.capabilities[0].honored);
        assert_eq!(report.suggested_strategy, Some(SyncStrategy::Incremental));
        assert!(report.suggestion.unwrap().contains("configured since_param"));
    }

    #[test]
    fn test_configured_stock_param_is_not_repeated() {
        assert_eq!(capability_candidates(Some("createdAfter")), vec!["createdAfter", "updatedAfter"]);
        assert_eq!(capability_candidates(None), PROBE_CAPABILITIES.to_vec());
    }

    #[test]
    fn test_ignored_filter_is_not_honored() {
        let check = check_capability("updatedAfter", 5, Ok(json!({"entries": [{"id": "a"}]})));
        assert!(!check.honored);
        assert_eq!(check.detail, "ignored: returned 1 items");
    }

    #[test]
    fn test_probe_propagates_base_failure() {
        let remote = MockRemote::new(Shape::Token, numbered_entries(2)).with_token("other");
        let err = probe_collection(&remote, &settings(), &CollectionConfig::new(MOCK_LIBRARY), 10, true, false)
            .unwrap_err();
        assert_eq!(err.status_code(), Some(401));
    }
}
