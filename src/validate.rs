//! Input validation for config values and command arguments.
//!
//! Sync modes resolve in three tiers: exact match → synonym lookup →
//! error with suggestion. Table names are checked before they are ever
//! interpolated into SQL.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

// ── Valid value sets ─────────────────────────────────────────

pub static VALID_SYNC_MODES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["incremental", "full"].into_iter().collect());

/// Since-filter parameters a collection may declare in `supports`.
pub static SINCE_CAPABILITIES: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    ["updatedAfter", "createdAfter", "modifiedAfter"]
        .into_iter()
        .collect()
});

// ── Synonym maps ─────────────────────────────────────────────

pub static SYNC_MODE_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("incr", "incremental"),
        ("inc", "incremental"),
        ("delta", "incremental"),
        ("rescan", "full"),
        ("all", "full"),
    ]
    .into_iter()
    .collect()
});

/// Normalize a sync mode via exact match or synonym lookup.
///
/// Returns the canonical mode, or an error with the original input
/// and an optional suggestion.
pub fn normalize_sync_mode(input: &str) -> Result<String, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    if VALID_SYNC_MODES.contains(lower.as_str()) {
        return Ok(lower);
    }

    if let Some(&canonical) = SYNC_MODE_SYNONYMS.get(lower.as_str()) {
        return Ok(canonical.to_string());
    }

    let suggestion = find_closest_match(&lower, &VALID_SYNC_MODES, &SYNC_MODE_SYNONYMS);
    Err((input.to_string(), suggestion))
}

/// Whether `name` is a declared since-filter capability.
#[must_use]
pub fn is_since_capability(name: &str) -> bool {
    SINCE_CAPABILITIES.contains(name)
}

// ── Table names ──────────────────────────────────────────────

/// Check that `name` is safe to use as an unquoted SQLite identifier.
///
/// ASCII letters, digits and underscores; must not start with a digit or
/// use the reserved `sqlite_` prefix.
pub fn validate_table_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("table name is empty".to_string());
    }
    if name.len() > 64 {
        return Err(format!("{name}: longer than 64 characters"));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("{name}: starts with a digit"));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(format!("{name}: the sqlite_ prefix is reserved"));
    }
    if let Some(bad) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(format!("{name}: invalid character {bad:?}"));
    }
    Ok(())
}

/// Default destination table for a collection: `mm_<sanitised id>`.
///
/// Runs of characters outside `[A-Za-z0-9]` collapse to one underscore and
/// the result is lowercased.
#[must_use]
pub fn default_table_name(collection_id: &str) -> String {
    let mut out = String::from("mm_");
    let mut pending_sep = false;
    for c in collection_id.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.ends_with('_') {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out == "mm_" {
        out.push_str("collection");
    }
    out.truncate(64);
    out
}

// ── Suggestions ──────────────────────────────────────────────

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            // Synonyms suggest their canonical value
            best = Some((synonyms.get(v).copied().unwrap_or(v), dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

/// Compute the Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Configured identifiers within edit distance 3 of `searched`.
///
/// Up to `max` suggestions, sorted by distance then alphabetically.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, id)| id.to_string())
        .collect()
}
