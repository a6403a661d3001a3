// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue of mutations made while offline.
//!
//! Entries live in the `_sync_queue` table next to the entity tables, so a
//! drain can rewrite records and mark entries in one transaction. Entries are
//! replayed in id order (FIFO).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::record::{format_timestamp, Record};
use crate::remote::RemoteError;
use crate::store::parse_timestamp;

/// Kind of mutation recorded in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            _ => Err(Error::CorruptedData(format!("unknown operation '{s}'"))),
        }
    }
}

/// Delivery state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Synced,
    Error,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Synced => "synced",
            EntryStatus::Error => "error",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "synced" => Ok(EntryStatus::Synced),
            "error" => Ok(EntryStatus::Error),
            _ => Err(Error::CorruptedData(format!("unknown queue status '{s}'"))),
        }
    }
}

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub id: i64,
    pub entity: String,
    pub operation: Operation,
    pub entity_id: String,
    pub payload: Record,
    pub created_at: DateTime<Utc>,
    pub status: EntryStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub retryable: bool,
}

impl QueueEntry {
    /// Failed in a way that replaying cannot fix; blocks later entries for
    /// the same record until retried or discarded.
    pub fn is_blocking(&self) -> bool {
        self.status == EntryStatus::Error && !self.retryable
    }

    /// The `(entity, entity_id)` pair this entry mutates.
    pub fn key(&self) -> (String, String) {
        (self.entity.clone(), self.entity_id.clone())
    }
}

const COLUMNS: &str =
    "id, entity, operation, entity_id, payload, created_at, status, attempts, last_error, retryable";

/// Durable FIFO of pending mutations.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    db: Database,
}

impl SyncQueue {
    pub fn new(db: Database) -> Self {
        SyncQueue { db }
    }

    /// Record a mutation and return its entry id.
    pub fn append(
        &self,
        entity: &str,
        operation: Operation,
        entity_id: &str,
        payload: &Record,
    ) -> Result<i64> {
        self.db
            .with_conn(|conn| append_in(conn, entity, operation, entity_id, payload))
    }

    /// Pending entries, oldest first.
    pub fn pending(&self) -> Result<Vec<QueueEntry>> {
        self.list(Some(EntryStatus::Pending))
    }

    pub fn pending_for(&self, entity: &str) -> Result<Vec<QueueEntry>> {
        self.db.with_conn(|conn| {
            select(
                conn,
                "WHERE status = 'pending' AND entity = ?1",
                params![entity],
            )
        })
    }

    /// Pending entry counts grouped by entity.
    pub fn pending_counts(&self) -> Result<BTreeMap<String, i64>> {
        self.counts(EntryStatus::Pending)
    }

    /// Entry counts with `status`, grouped by entity.
    pub fn counts(&self, status: EntryStatus) -> Result<BTreeMap<String, i64>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entity, COUNT(*) FROM _sync_queue WHERE status = ?1
                 GROUP BY entity ORDER BY entity",
            )?;
            let rows = stmt.query_map([status.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
        })
    }

    /// Entries a drain should attempt: pending plus retryable errors, FIFO.
    pub fn drainable(&self) -> Result<Vec<QueueEntry>> {
        self.db.with_conn(|conn| {
            select(
                conn,
                "WHERE status = 'pending' OR (status = 'error' AND retryable = 1)",
                [],
            )
        })
    }

    pub fn get(&self, entry_id: i64) -> Result<QueueEntry> {
        self.db
            .with_conn(|conn| get_in(conn, entry_id)?.ok_or(Error::EntryNotFound(entry_id)))
    }

    /// All entries, or those with `status`, oldest first.
    pub fn list(&self, status: Option<EntryStatus>) -> Result<Vec<QueueEntry>> {
        self.db.with_conn(|conn| match status {
            Some(status) => select(conn, "WHERE status = ?1", [status.as_str()]),
            None => select(conn, "", []),
        })
    }

    pub fn mark_synced(&self, entry_id: i64) -> Result<()> {
        self.db.with_conn(|conn| mark_synced_in(conn, entry_id))
    }

    /// Record a failed replay.
    ///
    /// Network failures leave the entry pending. Server failures become
    /// retryable errors. Rejections and malformed responses become
    /// non-retryable errors that block the record's later entries.
    pub fn mark_error(&self, entry_id: i64, error: &RemoteError) -> Result<()> {
        let status = if error.is_network() {
            EntryStatus::Pending
        } else {
            EntryStatus::Error
        };
        self.record_failure(entry_id, status, &error.to_string(), error.is_retryable())
    }

    /// Record a failure that no replay can fix.
    pub fn mark_rejected(&self, entry_id: i64, message: &str) -> Result<()> {
        self.record_failure(entry_id, EntryStatus::Error, message, false)
    }

    fn record_failure(
        &self,
        entry_id: i64,
        status: EntryStatus,
        message: &str,
        retryable: bool,
    ) -> Result<()> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE _sync_queue
                 SET status = ?1, last_error = ?2, retryable = ?3, attempts = attempts + 1
                 WHERE id = ?4",
                params![status.as_str(), message, retryable, entry_id],
            )?;
            if changed == 0 {
                return Err(Error::EntryNotFound(entry_id));
            }
            Ok(())
        })
    }

    /// Put a failed entry back to pending so the next drain replays it.
    pub fn retry(&self, entry_id: i64) -> Result<QueueEntry> {
        self.db.with_conn(|conn| {
            let entry = get_in(conn, entry_id)?.ok_or(Error::EntryNotFound(entry_id))?;
            if entry.status == EntryStatus::Error {
                conn.execute(
                    "UPDATE _sync_queue SET status = 'pending', retryable = 1 WHERE id = ?1",
                    [entry_id],
                )?;
            }
            get_in(conn, entry_id)?.ok_or(Error::EntryNotFound(entry_id))
        })
    }

    /// Drop an entry without replaying it.
    pub fn discard(&self, entry_id: i64) -> Result<QueueEntry> {
        self.db.with_conn(|conn| {
            let entry = get_in(conn, entry_id)?.ok_or(Error::EntryNotFound(entry_id))?;
            conn.execute("DELETE FROM _sync_queue WHERE id = ?1", [entry_id])?;
            Ok(entry)
        })
    }

    /// Delete synced entries; returns how many were removed.
    pub fn prune_synced(&self) -> Result<usize> {
        self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM _sync_queue WHERE status = 'synced'", [])?)
        })
    }

    /// Delete entries that synced before `cutoff`; returns how many.
    pub fn prune_synced_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.db
            .with_conn(|conn| prune_synced_before_in(conn, cutoff))
    }

    /// Point unsynced entries for `old_id` at `new_id`.
    pub fn retarget(&self, entity: &str, old_id: &str, new_id: &str) -> Result<usize> {
        self.db
            .with_conn(|conn| retarget_in(conn, entity, old_id, new_id))
    }

    /// Replace the payload of the unsynced `create` for `temp_id`.
    ///
    /// Returns false when there is no such entry.
    pub fn amend_create(&self, entity: &str, temp_id: &str, payload: &Record) -> Result<bool> {
        self.db
            .with_conn(|conn| amend_create_in(conn, entity, temp_id, payload))
    }

    /// Drop every unsynced entry for one record; returns how many.
    pub fn cancel(&self, entity: &str, entity_id: &str) -> Result<usize> {
        self.db.with_conn(|conn| cancel_in(conn, entity, entity_id))
    }

    /// Whether one record has entries not yet synced.
    pub fn has_unsynced(&self, entity: &str, entity_id: &str) -> Result<bool> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM _sync_queue
                     WHERE entity = ?1 AND entity_id = ?2 AND status != 'synced'
                 )",
                params![entity, entity_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Records whose replay is blocked by a non-retryable failure.
    pub fn blocking_keys(&self) -> Result<HashSet<(String, String)>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT entity, entity_id FROM _sync_queue
                 WHERE status = 'error' AND retryable = 0",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            Ok(rows.collect::<rusqlite::Result<HashSet<_>>>()?)
        })
    }

    /// Whether an unsynced entry for the same record follows `entry`.
    pub fn has_later_unsynced(&self, entry: &QueueEntry) -> Result<bool> {
        self.db.with_conn(|conn| has_later_unsynced_in(conn, entry))
    }
}

pub(crate) fn append_in(
    conn: &Connection,
    entity: &str,
    operation: Operation,
    entity_id: &str,
    payload: &Record,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO _sync_queue (entity, operation, entity_id, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entity,
            operation.as_str(),
            entity_id,
            serde_json::to_string(payload)?,
            format_timestamp(Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn amend_create_in(
    conn: &Connection,
    entity: &str,
    temp_id: &str,
    payload: &Record,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE _sync_queue SET payload = ?1
         WHERE id = (
             SELECT id FROM _sync_queue
             WHERE entity = ?2 AND entity_id = ?3
               AND operation = 'create' AND status != 'synced'
             ORDER BY id DESC LIMIT 1
         )",
        params![serde_json::to_string(payload)?, entity, temp_id],
    )?;
    Ok(changed > 0)
}

pub(crate) fn cancel_in(conn: &Connection, entity: &str, entity_id: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM _sync_queue
         WHERE entity = ?1 AND entity_id = ?2 AND status != 'synced'",
        params![entity, entity_id],
    )?)
}

pub(crate) fn has_later_unsynced_in(conn: &Connection, entry: &QueueEntry) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM _sync_queue
             WHERE entity = ?1 AND entity_id = ?2 AND id > ?3 AND status != 'synced'
         )",
        params![entry.entity, entry.entity_id, entry.id],
        |row| row.get(0),
    )?)
}

pub(crate) fn get_in(conn: &Connection, entry_id: i64) -> Result<Option<QueueEntry>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM _sync_queue WHERE id = ?1"),
            [entry_id],
            RawEntry::from_row,
        )
        .optional()?;
    raw.map(RawEntry::decode).transpose()
}

pub(crate) fn mark_synced_in(conn: &Connection, entry_id: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE _sync_queue
         SET status = 'synced', synced_at = ?1, last_error = NULL
         WHERE id = ?2",
        params![format_timestamp(Utc::now()), entry_id],
    )?;
    if changed == 0 {
        return Err(Error::EntryNotFound(entry_id));
    }
    Ok(())
}

pub(crate) fn retarget_in(
    conn: &Connection,
    entity: &str,
    old_id: &str,
    new_id: &str,
) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE _sync_queue SET entity_id = ?1
         WHERE entity = ?2 AND entity_id = ?3 AND status != 'synced'",
        params![new_id, entity, old_id],
    )?)
}

/// Rewrite references to `old_id` inside unsynced payloads.
pub(crate) fn rewrite_refs_in(conn: &Connection, old_id: &str, new_id: &str) -> Result<usize> {
    let rows = {
        let mut stmt = conn.prepare(
            "SELECT id, payload FROM _sync_queue
             WHERE status != 'synced' AND instr(payload, ?1) > 0",
        )?;
        let rows = stmt.query_map([old_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut rewritten = 0;
    for (entry_id, payload) in rows {
        let mut payload: Record = serde_json::from_str(&payload)
            .map_err(|e| Error::CorruptedData(format!("queue entry {entry_id}: {e}")))?;
        if payload.replace_refs(old_id, new_id) {
            conn.execute(
                "UPDATE _sync_queue SET payload = ?1 WHERE id = ?2",
                params![serde_json::to_string(&payload)?, entry_id],
            )?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

pub(crate) fn prune_synced_before_in(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM _sync_queue WHERE status = 'synced' AND synced_at < ?1",
        [format_timestamp(cutoff)],
    )?)
}

fn select<P: rusqlite::Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> Result<Vec<QueueEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM _sync_queue {filter} ORDER BY id"
    ))?;
    let rows = stmt.query_map(params, RawEntry::from_row)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.decode()?);
    }
    Ok(entries)
}

/// Column values before parsing the text-encoded fields.
struct RawEntry {
    id: i64,
    entity: String,
    operation: String,
    entity_id: String,
    payload: String,
    created_at: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    retryable: bool,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawEntry {
            id: row.get(0)?,
            entity: row.get(1)?,
            operation: row.get(2)?,
            entity_id: row.get(3)?,
            payload: row.get(4)?,
            created_at: row.get(5)?,
            status: row.get(6)?,
            attempts: row.get(7)?,
            last_error: row.get(8)?,
            retryable: row.get(9)?,
        })
    }

    fn decode(self) -> Result<QueueEntry> {
        let payload = serde_json::from_str(&self.payload)
            .map_err(|e| Error::CorruptedData(format!("queue entry {}: {e}", self.id)))?;
        Ok(QueueEntry {
            id: self.id,
            entity: self.entity,
            operation: self.operation.parse()?,
            entity_id: self.entity_id,
            payload,
            created_at: parse_timestamp(&self.created_at)?,
            status: self.status.parse()?,
            attempts: self.attempts,
            last_error: self.last_error,
            retryable: self.retryable,
        })
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
