//! Identifier and timestamp extraction from raw items.
//!
//! Remote libraries do not agree on field names, so both lookups walk an
//! ordered fallback chain and take the first usable value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Identifier fields, in priority order.
pub const ID_FIELDS: [&str; 3] = ["id", "ext_id", "memento_id"];

/// Modification timestamp fields, in priority order.
pub const TIMESTAMP_FIELDS: [&str; 9] = [
    "modifiedTime",
    "modified_time",
    "updatedAt",
    "updated_at",
    "modifiedAt",
    "modified_at",
    "lastModified",
    "last_modified",
    "modified",
];

/// Epoch values at or above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// A raw item with its identifier and timestamp resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorItem {
    pub id: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub payload: Value,
}

impl MirrorItem {
    /// Resolve a raw item; `None` when it has no usable identifier.
    #[must_use]
    pub fn from_raw(payload: Value, tempo_col: Option<&str>) -> Option<Self> {
        let id = extract_id(&payload)?;
        let modified_at = extract_timestamp(&payload, tempo_col);
        Some(Self {
            id,
            modified_at,
            payload,
        })
    }

    /// Canonical text of the modification timestamp.
    #[must_use]
    pub fn modified_at_text(&self) -> Option<String> {
        self.modified_at.map(format_timestamp)
    }
}

/// First non-empty identifier along [`ID_FIELDS`].
#[must_use]
pub fn extract_id(item: &Value) -> Option<String> {
    ID_FIELDS.iter().find_map(|field| match item.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Modification timestamp of an item.
///
/// A declared `tempo_col` is used exclusively; otherwise the first field of
/// [`TIMESTAMP_FIELDS`] that parses wins.
#[must_use]
pub fn extract_timestamp(item: &Value, tempo_col: Option<&str>) -> Option<DateTime<Utc>> {
    match tempo_col {
        Some(col) => item.get(col).and_then(parse_timestamp),
        None => TIMESTAMP_FIELDS
            .iter()
            .find_map(|field| item.get(*field).and_then(parse_timestamp)),
    }
}

/// Parse a JSON timestamp value.
///
/// Accepts RFC 3339, naive date-times (taken as UTC), plain dates and epoch
/// numbers in seconds or milliseconds.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// String form of [`parse_timestamp`].
#[must_use]
pub fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(epoch) = text.parse::<f64>() {
        return from_epoch(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical RFC 3339 UTC text, e.g. `2024-05-01T10:00:00Z`.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value >= EPOCH_MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    DateTime::from_timestamp_millis(millis.round() as i64)
}
