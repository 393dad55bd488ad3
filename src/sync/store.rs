//! Storage seams used by the sync controller.
//!
//! [`SqliteStorage`](crate::storage::SqliteStorage) implements all three
//! traits; tests wrap it to inject failures.

use super::item::MirrorItem;
use super::types::{CommitStats, RunRecord, SyncResult, Watermark};

/// Idempotent destination for mirrored items.
pub trait UpsertSink {
    /// Write a deduplicated batch into `table` in one all-or-nothing
    /// transaction, creating the table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed then.
    fn commit_batch(
        &mut self,
        table: &str,
        items: &[MirrorItem],
        synced_at: &str,
    ) -> SyncResult<CommitStats>;
}

/// Persistent per-collection watermarks.
pub trait WatermarkStore {
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_watermark(&self, collection_id: &str) -> SyncResult<Option<Watermark>>;

    /// Atomic upsert keyed by collection identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_watermark(
        &mut self,
        collection_id: &str,
        last_modified_remote: Option<&str>,
        last_run_utc: &str,
    ) -> SyncResult<()>;
}

/// Append-only run history.
pub trait RunLog {
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn record_run(&mut self, run: &RunRecord) -> SyncResult<()>;
}
