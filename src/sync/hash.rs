//! Content hashing for change detection.
//!
//! Mirrored rows store a SHA-256 of their payload so a re-delivered item can
//! be classified as unchanged without comparing every field.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 (hex) of the canonical JSON text of a payload.
///
/// Object keys serialize in sorted order, so two payloads that differ only
/// in key order hash the same.
#[must_use]
pub fn content_hash(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether a row must be rewritten.
///
/// True when nothing is stored yet or the stored hash differs.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}
