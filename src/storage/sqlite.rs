//! SQLite storage implementation.
//!
//! One connection serves every collection. Batch commits run inside an
//! IMMEDIATE transaction so a failed batch leaves no partial rows behind.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::schema::{apply_schema, destination_table_sql};
use crate::sync::{
    CommitStats, MirrorItem, RunLog, RunRecord, SyncError, SyncResult, UpsertSink, Watermark,
    WatermarkStore, content_hash, has_changed,
};
use crate::validate::validate_table_name;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// One row of a destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirroredRow {
    pub id: String,
    pub payload: String,
    pub modified_at: Option<String>,
    pub content_hash: String,
    pub synced_at: String,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside an IMMEDIATE transaction, committing on success.
    fn write<F, R>(&mut self, f: F) -> rusqlite::Result<R>
    where
        F: FnOnce(&Transaction) -> rusqlite::Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ==================
    // Destination tables
    // ==================

    /// Whether a table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self
            .conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
            .exists([table])?)
    }

    /// Row count of a destination table, `None` if it was never created.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid table names or failed queries.
    pub fn count_rows(&self, table: &str) -> Result<Option<usize>> {
        validate_table_name(table).map_err(Error::InvalidTableName)?;
        if !self.table_exists(table)? {
            return Ok(None);
        }
        let count: usize = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
        Ok(Some(count))
    }

    /// Fetch one mirrored row.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid table names or failed queries.
    pub fn get_row(&self, table: &str, id: &str) -> Result<Option<MirroredRow>> {
        validate_table_name(table).map_err(Error::InvalidTableName)?;
        if !self.table_exists(table)? {
            return Ok(None);
        }
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, payload, modified_at, content_hash, synced_at FROM \"{table}\" WHERE id = ?1"
                ),
                [id],
                |row| {
                    Ok(MirroredRow {
                        id: row.get(0)?,
                        payload: row.get(1)?,
                        modified_at: row.get(2)?,
                        content_hash: row.get(3)?,
                        synced_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ==================
    // Watermarks
    // ==================

    /// All stored watermarks, ordered by collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_watermarks(&self) -> Result<Vec<Watermark>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection_id, last_modified_remote, last_run_utc
             FROM sync_state ORDER BY collection_id",
        )?;
        let rows = stmt
            .query_map([], map_watermark)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Delete a collection's watermark so its next run is a full scan.
    ///
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn reset_watermark(&mut self, collection_id: &str) -> Result<bool> {
        let deleted = self.write(|tx| {
            tx.execute("DELETE FROM sync_state WHERE collection_id = ?1", [collection_id])
        })?;
        Ok(deleted > 0)
    }

    // ==================
    // Run history
    // ==================

    /// Most recent runs, newest first, optionally for one collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_runs(&self, collection: Option<&str>, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, collection, strategy, status, pages, processed, inserted, updated,
                    unchanged, skipped, watermark_before, watermark_after, error,
                    started_at, finished_at
             FROM sync_runs
             WHERE ?1 IS NULL OR collection = ?1
             ORDER BY started_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![collection, limit], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    collection: row.get(1)?,
                    strategy: row.get(2)?,
                    status: row.get(3)?,
                    pages: row.get(4)?,
                    processed: row.get(5)?,
                    inserted: row.get(6)?,
                    updated: row.get(7)?,
                    unchanged: row.get(8)?,
                    skipped: row.get(9)?,
                    watermark_before: row.get(10)?,
                    watermark_after: row.get(11)?,
                    error: row.get(12)?,
                    started_at: row.get(13)?,
                    finished_at: row.get(14)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn map_watermark(row: &rusqlite::Row<'_>) -> rusqlite::Result<Watermark> {
    Ok(Watermark {
        collection_id: row.get(0)?,
        last_modified_remote: row.get(1)?,
        last_run_utc: row.get(2)?,
    })
}

impl UpsertSink for SqliteStorage {
    fn commit_batch(
        &mut self,
        table: &str,
        items: &[MirrorItem],
        synced_at: &str,
    ) -> SyncResult<CommitStats> {
        validate_table_name(table).map_err(SyncError::InvalidTable)?;

        let stats = self.write(|tx| {
            tx.execute_batch(&destination_table_sql(table))?;

            let mut lookup =
                tx.prepare_cached(&format!("SELECT content_hash FROM \"{table}\" WHERE id = ?1"))?;
            let mut insert = tx.prepare_cached(&format!(
                "INSERT INTO \"{table}\" (id, payload, modified_at, content_hash, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ))?;
            let mut update = tx.prepare_cached(&format!(
                "UPDATE \"{table}\"
                 SET payload = ?2, modified_at = ?3, content_hash = ?4, synced_at = ?5
                 WHERE id = ?1"
            ))?;

            let mut stats = CommitStats::default();
            for item in items {
                let payload = item.payload.to_string();
                let hash = content_hash(&item.payload);
                let modified_at = item.modified_at_text();
                let stored: Option<String> =
                    lookup.query_row([&item.id], |row| row.get(0)).optional()?;

                match stored {
                    None => {
                        insert.execute(params![item.id, payload, modified_at, hash, synced_at])?;
                        stats.inserted += 1;
                    }
                    Some(ref existing) if has_changed(&hash, Some(existing.as_str())) => {
                        update.execute(params![item.id, payload, modified_at, hash, synced_at])?;
                        stats.updated += 1;
                    }
                    Some(_) => stats.unchanged += 1,
                }
            }
            Ok(stats)
        })?;

        Ok(stats)
    }
}

impl WatermarkStore for SqliteStorage {
    fn get_watermark(&self, collection_id: &str) -> SyncResult<Option<Watermark>> {
        let watermark = self
            .conn
            .query_row(
                "SELECT collection_id, last_modified_remote, last_run_utc
                 FROM sync_state WHERE collection_id = ?1",
                [collection_id],
                map_watermark,
            )
            .optional()?;
        Ok(watermark)
    }

    fn put_watermark(
        &mut self,
        collection_id: &str,
        last_modified_remote: Option<&str>,
        last_run_utc: &str,
    ) -> SyncResult<()> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO sync_state (collection_id, last_modified_remote, last_run_utc)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection_id) DO UPDATE SET
                    last_modified_remote = excluded.last_modified_remote,
                    last_run_utc = excluded.last_run_utc",
                params![collection_id, last_modified_remote, last_run_utc],
            )
        })?;
        Ok(())
    }
}

impl RunLog for SqliteStorage {
    fn record_run(&mut self, run: &RunRecord) -> SyncResult<()> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO sync_runs (id, collection, strategy, status, pages, processed,
                    inserted, updated, unchanged, skipped, watermark_before, watermark_after,
                    error, started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    run.id,
                    run.collection,
                    run.strategy,
                    run.status,
                    run.pages,
                    run.processed,
                    run.inserted,
                    run.updated,
                    run.unchanged,
                    run.skipped,
                    run.watermark_before,
                    run.watermark_after,
                    run.error,
                    run.started_at,
                    run.finished_at,
                ],
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{SyncReport, SyncStrategy};
    use serde_json::json;

    fn item(id: &str, title: &str, modified: &str) -> MirrorItem {
        MirrorItem::from_raw(json!({"id": id, "title": title, "modifiedTime": modified}), None)
            .unwrap()
    }

    #[test]
    fn test_open_memory() {
        assert!(SqliteStorage::open_memory().is_ok());
    }

    #[test]
    fn test_open_file_creates_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = SqliteStorage::open(&dir.path().join("mirror.db")).unwrap();
        assert!(storage.table_exists("sync_state").unwrap());
    }

    #[test]
    fn test_commit_batch_classifies_rows() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let first = vec![
            item("a", "one", "2024-05-01T10:00:00Z"),
            item("b", "two", "2024-05-01T11:00:00Z"),
        ];
        let stats = storage.commit_batch("mm_test", &first, "t1").unwrap();
        assert_eq!(stats, CommitStats { inserted: 2, updated: 0, unchanged: 0 });

        let second = vec![
            item("a", "one", "2024-05-01T10:00:00Z"),
            item("b", "two (edited)", "2024-05-02T09:00:00Z"),
            item("c", "three", "2024-05-02T10:00:00Z"),
        ];
        let stats = storage.commit_batch("mm_test", &second, "t2").unwrap();
        assert_eq!(stats, CommitStats { inserted: 1, updated: 1, unchanged: 1 });

        assert_eq!(storage.count_rows("mm_test").unwrap(), Some(3));
        let b = storage.get_row("mm_test", "b").unwrap().unwrap();
        assert_eq!(b.modified_at.as_deref(), Some("2024-05-02T09:00:00Z"));
        assert_eq!(b.synced_at, "t2");
        let a = storage.get_row("mm_test", "a").unwrap().unwrap();
        assert_eq!(a.synced_at, "t1");
    }

    #[test]
    fn test_commit_batch_rejects_bad_table() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = storage
            .commit_batch("x; DROP TABLE sync_state", &[], "t")
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidTable(_)));
        assert!(storage.table_exists("sync_state").unwrap());
    }

    #[test]
    fn test_empty_batch_creates_table() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert_eq!(storage.count_rows("mm_empty").unwrap(), None);
        storage.commit_batch("mm_empty", &[], "t").unwrap();
        assert_eq!(storage.count_rows("mm_empty").unwrap(), Some(0));
    }

    #[test]
    fn test_watermark_upsert_and_reset() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.get_watermark("books").unwrap().is_none());

        storage.put_watermark("books", None, "2024-05-01T00:00:00Z").unwrap();
        storage
            .put_watermark("books", Some("2024-04-30T12:00:00Z"), "2024-05-02T00:00:00Z")
            .unwrap();
        let wm = storage.get_watermark("books").unwrap().unwrap();
        assert_eq!(wm.last_modified_remote.as_deref(), Some("2024-04-30T12:00:00Z"));
        assert_eq!(wm.last_run_utc, "2024-05-02T00:00:00Z");
        assert_eq!(storage.list_watermarks().unwrap().len(), 1);

        assert!(storage.reset_watermark("books").unwrap());
        assert!(!storage.reset_watermark("books").unwrap());
        assert!(storage.get_watermark("books").unwrap().is_none());
    }

    #[test]
    fn test_run_history() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for (collection, started) in [("books", "2024-05-01T00:00:00Z"), ("films", "2024-05-02T00:00:00Z")] {
            let report = SyncReport::start(collection, "t", SyncStrategy::Full, started.to_string());
            storage.record_run(&RunRecord::from_report(&report)).unwrap();
        }

        let all = storage.list_runs(None, 10).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].collection, "films");
        assert_eq!(all[0].status, "failed");

        let books = storage.list_runs(Some("books"), 10).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].strategy, "full");
    }
}
