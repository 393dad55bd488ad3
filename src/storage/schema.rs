//! Database schema definitions.
//!
//! Fixed tables hold sync bookkeeping. Destination tables are created per
//! collection on first commit by [`destination_table_sql`].

use rusqlite::{Connection, Result};

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Fixed bookkeeping tables.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
);

-- One watermark row per collection
CREATE TABLE IF NOT EXISTS sync_state (
    collection_id TEXT PRIMARY KEY,
    last_modified_remote TEXT,
    last_run_utc TEXT NOT NULL
);

-- Run history (best effort, append only)
CREATE TABLE IF NOT EXISTS sync_runs (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    strategy TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('success', 'no_changes', 'truncated', 'failed')),
    pages INTEGER NOT NULL DEFAULT 0,
    processed INTEGER NOT NULL DEFAULT 0,
    inserted INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    unchanged INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    watermark_before TEXT,
    watermark_after TEXT,
    error TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_collection ON sync_runs(collection, started_at DESC);
CREATE INDEX IF NOT EXISTS idx_sync_runs_started ON sync_runs(started_at DESC);
";

/// DDL for one collection's destination table.
///
/// `table` must already have passed
/// [`validate_table_name`](crate::validate::validate_table_name).
#[must_use]
pub fn destination_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            modified_at TEXT,
            content_hash TEXT NOT NULL,
            synced_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS \"idx_{table}_modified_at\" ON \"{table}\"(modified_at);"
    )
}

/// Apply pragmas and create the fixed tables.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-16000")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().to_rfc3339()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables = table_names(&conn);
        assert!(tables.contains(&"sync_state".to_string()));
        assert!(tables.contains(&"sync_runs".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_run_status_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = |id: &str, status: &str| {
            conn.execute(
                "INSERT INTO sync_runs (id, collection, strategy, status, started_at, finished_at)
                 VALUES (?1, 'c', 'full', ?2, 't', 't')",
                [id, status],
            )
        };
        assert!(insert("run_1", "truncated").is_ok());
        assert!(insert("run_2", "exploded").is_err());
    }

    #[test]
    fn test_destination_table_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&destination_table_sql("mm_books")).unwrap();
        conn.execute_batch(&destination_table_sql("mm_books")).unwrap();
        assert!(table_names(&conn).contains(&"mm_books".to_string()));
    }
}
