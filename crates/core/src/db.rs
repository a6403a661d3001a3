// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite database shared by the local store and the sync queue.
//!
//! Both live in one file so that a temp-id rewrite, the queue retarget and
//! the `synced` mark commit in a single transaction.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction};

use crate::error::{Error, Result};
use crate::schema::{Schema, TableSpec};

/// Internal tables, created regardless of the entity schema.
pub const INTERNAL_SCHEMA: &str = r#"
-- Write-ahead log of mutations made while offline
CREATE TABLE IF NOT EXISTS _sync_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity TEXT NOT NULL,
    operation TEXT NOT NULL,       -- create|update|delete
    entity_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',  -- pending|synced|error
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    retryable INTEGER NOT NULL DEFAULT 1,
    synced_at TEXT
);

-- Last successful full fetch per entity
CREATE TABLE IF NOT EXISTS _sync_meta (
    entity TEXT PRIMARY KEY,
    last_fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_queue_status ON _sync_queue(status);
CREATE INDEX IF NOT EXISTS idx_sync_queue_target ON _sync_queue(entity, entity_id);
"#;

/// Handle to the engine database. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database at `path` and bring it to `schema`.
    pub fn open(path: &Path, schema: &Schema) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        run_migrations(&conn, schema)?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database (tests, dry runs).
    pub fn open_in_memory(schema: &Schema) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn, schema)?;
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Run `f` with the connection locked.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a transaction; commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// The schema version recorded in the file.
    pub fn schema_version(&self) -> Result<i64> {
        self.with_conn(read_version)
    }
}

fn read_version(conn: &Connection) -> Result<i64> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Create internal tables, every entity table and its indexes, then bump
/// `user_version`.
///
/// Tables and indexes are created with `IF NOT EXISTS`, so reopening with the
/// same or a newer schema is idempotent. A file written by a newer schema is
/// refused rather than silently downgraded.
pub fn run_migrations(conn: &Connection, schema: &Schema) -> Result<()> {
    schema.validate()?;

    let found = read_version(conn)?;
    if found > schema.version {
        return Err(Error::SchemaVersion {
            found,
            supported: schema.version,
        });
    }

    conn.execute_batch(INTERNAL_SCHEMA)?;
    for table in &schema.tables {
        create_entity_table(conn, table)?;
    }

    if found < schema.version {
        conn.pragma_update(None, "user_version", schema.version)?;
        tracing::info!(
            "local schema migrated from version {} to {}",
            found,
            schema.version
        );
    }
    Ok(())
}

fn create_entity_table(conn: &Connection, table: &TableSpec) -> Result<()> {
    // Names are validated identifiers, so quoting them inline is safe.
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (id TEXT PRIMARY KEY, data TEXT NOT NULL);",
        table.name
    ))?;
    for field in &table.indexes {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS \"{}\" ON \"{}\"(json_extract(data, '$.{}'));",
            table.index_name(field),
            table.name,
            field
        ))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
