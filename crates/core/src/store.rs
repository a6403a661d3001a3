// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable keyed record storage, one SQLite table per entity.
//!
//! Records are stored as JSON in a `data` column. Predicate clauses are
//! pushed into SQL as `json_extract(data, '$.field') = ?`, which SQLite
//! answers from the expression index when the field was declared indexed,
//! and the result is re-checked with [`Record::matches`] so both paths agree
//! on equality.

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::record::{format_timestamp, Predicate, Record};
use crate::schema::{validate_field_name, validate_table_name};

/// Keyed table storage shared by gateways and the reconciler.
#[derive(Debug, Clone)]
pub struct LocalStore {
    db: Database,
}

impl LocalStore {
    pub fn new(db: Database) -> Self {
        LocalStore { db }
    }

    /// Upsert one record by id.
    pub fn put(&self, table: &str, record: &Record) -> Result<()> {
        self.db.with_conn(|conn| put_record(conn, table, record))
    }

    /// Upsert many records in one transaction.
    pub fn put_many(&self, table: &str, records: &[Record]) -> Result<()> {
        self.db.transaction(|tx| {
            for record in records {
                put_record(tx, table, record)?;
            }
            Ok(())
        })
    }

    pub fn get(&self, table: &str, id: &str) -> Result<Option<Record>> {
        self.db.with_conn(|conn| get_record(conn, table, id))
    }

    /// All records matching every clause of `predicate`, in insertion order.
    pub fn query(&self, table: &str, predicate: &Predicate) -> Result<Vec<Record>> {
        self.db.with_conn(|conn| query_records(conn, table, predicate))
    }

    pub fn all(&self, table: &str) -> Result<Vec<Record>> {
        self.query(table, &Predicate::new())
    }

    pub fn count(&self, table: &str) -> Result<i64> {
        validate_table_name(table)?;
        self.db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
                row.get(0)
            })?)
        })
    }

    /// Delete by id. Deleting a missing id is not an error.
    pub fn remove(&self, table: &str, id: &str) -> Result<()> {
        self.db.with_conn(|conn| remove_record(conn, table, id))
    }

    /// Move a record from `old_id` to the id carried by `record`.
    pub fn rekey(&self, table: &str, old_id: &str, record: &Record) -> Result<()> {
        self.db.transaction(|tx| rekey_record(tx, table, old_id, record))
    }

    /// When `entity` was last fetched in full from the remote.
    pub fn last_fetched(&self, entity: &str) -> Result<Option<DateTime<Utc>>> {
        self.db.with_conn(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT last_fetched_at FROM _sync_meta WHERE entity = ?1",
                    [entity],
                    |row| row.get(0),
                )
                .optional()?;
            value.map(|s| parse_timestamp(&s)).transpose()
        })
    }

    pub fn touch_fetched(&self, entity: &str, at: DateTime<Utc>) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO _sync_meta (entity, last_fetched_at) VALUES (?1, ?2)
                 ON CONFLICT(entity) DO UPDATE SET last_fetched_at = excluded.last_fetched_at",
                params![entity, format_timestamp(at)],
            )?;
            Ok(())
        })
    }
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::CorruptedData(format!("invalid timestamp '{value}'")))
}

fn decode_row(table: &str, id: &str, data: &str) -> Result<Record> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| Error::CorruptedData(format!("{table}/{id}: {e}")))?;
    Record::from_value(value).map_err(|e| Error::CorruptedData(format!("{table}/{id}: {e}")))
}

pub(crate) fn put_record(conn: &Connection, table: &str, record: &Record) -> Result<()> {
    validate_table_name(table)?;
    let id = record.require_id()?;
    let data = serde_json::to_string(record)?;
    conn.execute(
        &format!(
            "INSERT INTO \"{table}\" (id, data) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data"
        ),
        params![id, data],
    )?;
    Ok(())
}

pub(crate) fn get_record(conn: &Connection, table: &str, id: &str) -> Result<Option<Record>> {
    validate_table_name(table)?;
    let data: Option<String> = conn
        .query_row(
            &format!("SELECT data FROM \"{table}\" WHERE id = ?1"),
            [id],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|d| decode_row(table, id, &d)).transpose()
}

pub(crate) fn remove_record(conn: &Connection, table: &str, id: &str) -> Result<()> {
    validate_table_name(table)?;
    conn.execute(&format!("DELETE FROM \"{table}\" WHERE id = ?1"), [id])?;
    Ok(())
}

pub(crate) fn rekey_record(
    conn: &Connection,
    table: &str,
    old_id: &str,
    record: &Record,
) -> Result<()> {
    remove_record(conn, table, old_id)?;
    put_record(conn, table, record)
}

/// Rewrite references to `old_id` in every cached row of `table`.
pub(crate) fn rewrite_refs_in(
    conn: &Connection,
    table: &str,
    old_id: &str,
    new_id: &str,
) -> Result<usize> {
    validate_table_name(table)?;
    let rows = {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, data FROM \"{table}\" WHERE instr(data, ?1) > 0"
        ))?;
        let rows = stmt.query_map([old_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut rewritten = 0;
    for (id, data) in rows {
        let mut record = decode_row(table, &id, &data)?;
        if record.replace_refs(old_id, new_id) {
            put_record(conn, table, &record)?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

/// Cache a server-confirmed record, overwriting any cached copy.
pub(crate) fn put_confirmed(conn: &Connection, table: &str, record: &Record) -> Result<Record> {
    let mut confirmed = record.clone();
    confirmed.mark_synced();
    put_record(conn, table, &confirmed)?;
    Ok(confirmed)
}

/// Cache a fetched record unless the cached copy has unsynced local changes.
///
/// Returns false when the record was skipped.
pub(crate) fn cache_fetched(conn: &Connection, table: &str, record: &Record) -> Result<bool> {
    let id = record.require_id()?;
    if let Some(existing) = get_record(conn, table, &id)? {
        if !existing.is_synced() {
            return Ok(false);
        }
    }
    put_confirmed(conn, table, record)?;
    Ok(true)
}

/// SQL operand for a JSON scalar, as `json_extract` would return it.
fn sql_operand(value: &Value) -> Option<SqlValue> {
    match value {
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub(crate) fn query_records(
    conn: &Connection,
    table: &str,
    predicate: &Predicate,
) -> Result<Vec<Record>> {
    validate_table_name(table)?;

    let mut clauses = Vec::new();
    let mut args = Vec::new();
    for (field, value) in predicate.iter() {
        validate_field_name(field)?;
        if value.is_null() {
            clauses.push(format!("json_extract(data, '$.{field}') IS NULL"));
        } else if let Some(operand) = sql_operand(value) {
            args.push(operand);
            clauses.push(format!(
                "json_extract(data, '$.{field}') = ?{}",
                args.len()
            ));
        }
    }

    let mut sql = format!("SELECT id, data FROM \"{table}\"");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, data) = row?;
        let record = decode_row(table, &id, &data)?;
        if record.matches(predicate) {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
