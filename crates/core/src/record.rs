// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cached entity records and exact-match predicates.
//!
//! Records are schemaless JSON objects keyed by `id`. The engine keeps its
//! bookkeeping (`_offline`, `synced`, `updated_at`) inside the object so the UI
//! sees the same shape whether a row came from the server or the cache.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::id::is_temp_id;

pub const ID_FIELD: &str = "id";
pub const OFFLINE_FIELD: &str = "_offline";
pub const SYNCED_FIELD: &str = "synced";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Format a timestamp the way records store it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One entity instance as JSON fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(Map::new())
    }

    /// Build a record from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Record(map)),
            other => Err(Error::InvalidRecord(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The record's id, normalising numeric server ids to strings.
    pub fn id(&self) -> Option<String> {
        match self.0.get(ID_FIELD)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn require_id(&self) -> Result<String> {
        self.id()
            .ok_or_else(|| Error::InvalidRecord("record has no id".to_string()))
    }

    pub fn set_id(&mut self, id: &str) {
        self.0
            .insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Shallow-merge `patch` into this record; patch fields win.
    pub fn merge(&mut self, patch: &Record) {
        for (field, value) in &patch.0 {
            self.0.insert(field.clone(), value.clone());
        }
    }

    /// True when the record was written locally while offline.
    pub fn is_offline(&self) -> bool {
        matches!(self.0.get(OFFLINE_FIELD), Some(Value::Bool(true)))
    }

    /// True unless the record carries unsynced local changes.
    pub fn is_synced(&self) -> bool {
        !matches!(self.0.get(SYNCED_FIELD), Some(Value::Bool(false)))
    }

    /// Stamp the bookkeeping of an optimistic local write.
    pub fn mark_offline(&mut self, at: DateTime<Utc>) {
        self.insert(OFFLINE_FIELD, true);
        self.insert(SYNCED_FIELD, false);
        self.insert(UPDATED_AT_FIELD, format_timestamp(at));
    }

    /// Stamp the bookkeeping of a server-confirmed record.
    pub fn mark_synced(&mut self) {
        self.insert(OFFLINE_FIELD, false);
        self.insert(SYNCED_FIELD, true);
    }

    /// The record without id and local bookkeeping, as sent to the remote.
    pub fn payload(&self) -> Record {
        let mut payload = self.clone();
        payload.remove(ID_FIELD);
        payload.remove(OFFLINE_FIELD);
        payload.remove(SYNCED_FIELD);
        payload
    }

    /// Replace every string equal to `from` with `to`, nested values
    /// included. Returns whether anything changed.
    pub fn replace_refs(&mut self, from: &str, to: &str) -> bool {
        let mut changed = false;
        for value in self.0.values_mut() {
            changed |= replace_in(value, from, to);
        }
        changed
    }

    /// The first temp id referenced by a field other than `id`.
    pub fn temp_ref(&self) -> Option<&str> {
        self.0
            .iter()
            .filter(|(field, _)| field.as_str() != ID_FIELD)
            .find_map(|(_, value)| find_temp_id(value))
    }

    /// Exact-match test against every field of `predicate`.
    ///
    /// A `null` predicate value matches a missing field.
    pub fn matches(&self, predicate: &Predicate) -> bool {
        predicate
            .iter()
            .all(|(field, expected)| match self.0.get(field) {
                Some(actual) => values_equal(actual, expected),
                None => expected.is_null(),
            })
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Record(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Record::from_value(value)
    }
}

fn replace_in(value: &mut Value, from: &str, to: &str) -> bool {
    match value {
        Value::String(s) if s.as_str() == from => {
            *s = to.to_string();
            true
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| replace_in(item, from, to) | changed),
        Value::Object(map) => map
            .values_mut()
            .fold(false, |changed, item| replace_in(item, from, to) | changed),
        _ => false,
    }
}

fn find_temp_id(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if is_temp_id(s) => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(find_temp_id),
        Value::Object(map) => map.values().find_map(find_temp_id),
        _ => None,
    }
}

/// Numbers compare by value so `50` matches `50.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Exact-match field predicate, e.g. `{status: "aberto"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(BTreeMap<String, Value>);

impl Predicate {
    pub fn new() -> Self {
        Predicate(BTreeMap::new())
    }

    /// Add an equality clause.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Predicate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Predicate(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
