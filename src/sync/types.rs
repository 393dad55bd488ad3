//! Sync types: strategies, outcomes, reports and run records.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::{DEFAULT_MAX_PAGES, FetchEnd, FetchError, RetryPolicy};
use crate::pagination::PaginationScheme;
use crate::validate::normalize_sync_mode;

/// Default page size requested from the remote.
pub const DEFAULT_LIMIT: usize = 100;

/// How a collection is fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum SyncStrategy {
    /// Only items changed since the stored watermark.
    #[default]
    Incremental,
    /// Every item, no since-filter.
    Full,
}

impl std::fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incremental => write!(f, "incremental"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for SyncStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_sync_mode(s) {
            Ok(mode) if mode == "full" => Ok(Self::Full),
            Ok(_) => Ok(Self::Incremental),
            Err((input, Some(suggestion))) => {
                Err(format!("{input} (did you mean {suggestion}?)"))
            }
            Err((input, None)) => Err(input),
        }
    }
}

impl TryFrom<String> for SyncStrategy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map_err(|e| format!("invalid sync mode: {e}"))
    }
}

/// Defaults applied to every collection unless it overrides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDefaults {
    pub sync: SyncStrategy,
    pub limit: usize,
    pub max_pages: usize,
    pub page_delay: Duration,
    /// Send `include=fields`.
    pub include_fields: bool,
    /// Subtracted from the watermark before it is sent as a since-filter.
    pub watermark_overlap: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncDefaults {
    fn default() -> Self {
        Self {
            sync: SyncStrategy::Incremental,
            limit: DEFAULT_LIMIT,
            max_pages: DEFAULT_MAX_PAGES,
            page_delay: Duration::ZERO,
            include_fields: true,
            watermark_overlap: Duration::ZERO,
            retry: RetryPolicy::default(),
        }
    }
}

/// Per-collection watermark row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Watermark {
    pub collection_id: String,
    /// Highest committed modification timestamp, canonical RFC 3339.
    pub last_modified_remote: Option<String>,
    pub last_run_utc: String,
}

/// Terminal state of one collection sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Items committed and watermark advanced.
    Success,
    /// Fetched to exhaustion; nothing inserted or updated.
    NoChanges,
    /// Fetch ended early; items committed, watermark held.
    Truncated,
    /// Fetch aborted or commit failed; watermark held.
    Failed,
}

impl SyncOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoChanges => "no_changes",
            Self::Truncated => "truncated",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row counts from one batch commit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl CommitStats {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    /// Whether the commit wrote anything.
    #[must_use]
    pub const fn any_changes(&self) -> bool {
        self.inserted + self.updated > 0
    }
}

/// Result of syncing one collection.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub collection: String,
    pub table: String,
    /// Strategy asked for by config or flags.
    pub requested: SyncStrategy,
    /// Strategy actually used.
    pub strategy: SyncStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downgrade_reason: Option<String>,
    pub outcome: SyncOutcome,
    pub scheme: Option<PaginationScheme>,
    pub fetch_end: Option<FetchEnd>,
    pub pages: usize,
    /// Raw items seen across all pages.
    pub processed: usize,
    /// Items without an identifier.
    pub skipped: usize,
    /// Items dropped because a later page repeated their identifier.
    pub duplicates: usize,
    #[serde(flatten)]
    pub stats: CommitStats,
    pub watermark_before: Option<String>,
    pub watermark_after: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl SyncReport {
    /// Empty report for a collection about to be synced.
    #[must_use]
    pub fn start(collection: &str, table: &str, requested: SyncStrategy, started_at: String) -> Self {
        Self {
            collection: collection.to_string(),
            table: table.to_string(),
            requested,
            strategy: requested,
            downgrade_reason: None,
            outcome: SyncOutcome::Failed,
            scheme: None,
            fetch_end: None,
            pages: 0,
            processed: 0,
            skipped: 0,
            duplicates: 0,
            stats: CommitStats::default(),
            watermark_before: None,
            watermark_after: None,
            warnings: Vec::new(),
            error: None,
            started_at: started_at.clone(),
            finished_at: started_at,
        }
    }
}

/// One row of the `sync_runs` history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub collection: String,
    pub strategy: String,
    pub status: String,
    pub pages: usize,
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub watermark_before: Option<String>,
    pub watermark_after: Option<String>,
    pub error: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl RunRecord {
    /// History row for a finished report.
    #[must_use]
    pub fn from_report(report: &SyncReport) -> Self {
        Self {
            id: format!("run_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
            collection: report.collection.clone(),
            strategy: report.strategy.to_string(),
            status: report.outcome.to_string(),
            pages: report.pages,
            processed: report.processed,
            inserted: report.stats.inserted,
            updated: report.stats.updated,
            unchanged: report.stats.unchanged,
            skipped: report.skipped,
            watermark_before: report.watermark_before.clone(),
            watermark_after: report.watermark_after.clone(),
            error: report.error.clone(),
            started_at: report.started_at.clone(),
            finished_at: report.finished_at.clone(),
        }
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    /// A store implementation refused the operation.
    #[error("Store error: {0}")]
    Store(String),
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing_accepts_synonyms() {
        assert_eq!("delta".parse::<SyncStrategy>(), Ok(SyncStrategy::Incremental));
        assert_eq!("ALL".parse::<SyncStrategy>(), Ok(SyncStrategy::Full));
        let err = "ful".parse::<SyncStrategy>().unwrap_err();
        assert!(err.contains("did you mean full"));
    }

    #[test]
    fn test_strategy_deserializes_via_synonyms() {
        let parsed: SyncStrategy = serde_json::from_str("\"rescan\"").unwrap();
        assert_eq!(parsed, SyncStrategy::Full);
        assert!(serde_json::from_str::<SyncStrategy>("\"weekly\"").is_err());
        assert_eq!(serde_json::to_string(&SyncStrategy::Incremental).unwrap(), "\"incremental\"");
    }

    #[test]
    fn test_commit_stats() {
        let stats = CommitStats {
            inserted: 2,
            updated: 1,
            unchanged: 4,
        };
        assert_eq!(stats.total(), 7);
        assert!(stats.any_changes());
        assert!(!CommitStats::default().any_changes());
    }

    #[test]
    fn test_run_record_from_report() {
        let mut report = SyncReport::start("books", "mm_books", SyncStrategy::Incremental, "t0".into());
        report.outcome = SyncOutcome::NoChanges;
        report.stats.unchanged = 3;
        let run = RunRecord::from_report(&report);
        assert!(run.id.starts_with("run_"));
        assert_eq!(run.id.len(), 16);
        assert_eq!(run.status, "no_changes");
        assert_eq!(run.unchanged, 3);
    }
}
