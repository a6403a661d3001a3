// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-entity read/write contract over the remote and the local cache.
//!
//! Routing is decided on every call from the connectivity monitor:
//!
//! - Reads go to the remote when online and refresh the cache; remote
//!   failures degrade to cached data.
//! - Writes go to the remote when online. For offline-writable entities a
//!   remote failure, or being offline, takes the optimistic path: the cache
//!   is written and a queue entry appended in one transaction.
//! - Offline writes to other entities fail with [`Error::Connectivity`] and
//!   touch nothing.
//!
//! Records created offline carry a temp id until the reconciler replays the
//! create. Writes that reference a temp id queue behind that create even
//! when online. Updates to such a record are folded into its queued create, and
//! deleting it cancels the create.

use std::sync::Arc;

use chrono::Utc;

use crate::connectivity::ConnectivityMonitor;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::id::generate_temp_id;
use crate::queue::{self, Operation, SyncQueue};
use crate::record::{format_timestamp, Predicate, Record, CREATED_AT_FIELD};
use crate::registry::EntityDescriptor;
use crate::remote::{RemoteApi, RemoteError};
use crate::store::{self, LocalStore};

pub use crate::id::is_temp_id;

/// Read/write access to one entity.
#[derive(Debug, Clone)]
pub struct EntityGateway {
    descriptor: Arc<EntityDescriptor>,
    db: Database,
    store: LocalStore,
    queue: SyncQueue,
    monitor: Arc<ConnectivityMonitor>,
}

impl EntityGateway {
    pub fn new(
        descriptor: Arc<EntityDescriptor>,
        db: Database,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Self {
        EntityGateway {
            descriptor,
            store: LocalStore::new(db.clone()),
            queue: SyncQueue::new(db.clone()),
            db,
            monitor,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub fn is_offline_writable(&self) -> bool {
        self.descriptor.offline_writable
    }

    fn table(&self) -> &str {
        &self.descriptor.table
    }

    fn remote(&self) -> &dyn RemoteApi {
        self.descriptor.remote.as_ref()
    }

    /// Every record. Online this refreshes the cache; otherwise, or when the
    /// fetch fails and something is cached, it returns the cache.
    pub async fn list(&self) -> Result<Vec<Record>> {
        if !self.monitor.is_online() {
            tracing::debug!(entity = self.name(), "list from cache (offline)");
            return self.store.all(self.table());
        }

        match self.remote().list().await {
            Ok(records) => {
                let records = self.cache_fetched(records)?;
                self.store.touch_fetched(self.name(), Utc::now())?;
                Ok(records)
            }
            Err(e) => {
                let cached = self.store.all(self.table())?;
                if cached.is_empty() {
                    return Err(e.into());
                }
                tracing::warn!(entity = self.name(), error = %e, "list failed, serving cache");
                Ok(cached)
            }
        }
    }

    /// One record by id, or `None` when it does not exist.
    pub async fn get(&self, id: &str) -> Result<Option<Record>> {
        if !self.monitor.is_online() || is_temp_id(id) {
            return self.store.get(self.table(), id);
        }

        match self.remote().get(id).await {
            Ok(record) => {
                let mut records = self.cache_fetched(vec![record])?;
                Ok(records.pop())
            }
            Err(e) if e.is_not_found() => {
                let table = self.table();
                self.db.transaction(|tx| {
                    if let Some(cached) = store::get_record(tx, table, id)? {
                        if cached.is_synced() {
                            store::remove_record(tx, table, id)?;
                        }
                    }
                    Ok(())
                })?;
                Ok(None)
            }
            Err(e) => match self.store.get(self.table(), id)? {
                Some(cached) => {
                    tracing::warn!(entity = self.name(), id, error = %e, "get failed, serving cache");
                    Ok(Some(cached))
                }
                None => Err(e.into()),
            },
        }
    }

    /// Records matching every clause of `predicate`.
    ///
    /// An empty remote result is returned but not cached, so a transient empty
    /// answer cannot be mistaken for a cleared table.
    pub async fn filter(&self, predicate: &Predicate) -> Result<Vec<Record>> {
        if !self.monitor.is_online() {
            return self.store.query(self.table(), predicate);
        }

        match self.remote().filter(predicate).await {
            Ok(records) if records.is_empty() => Ok(records),
            Ok(records) => self.cache_fetched(records),
            Err(e) => {
                tracing::warn!(entity = self.name(), error = %e, "filter failed, querying cache");
                self.store.query(self.table(), predicate)
            }
        }
    }

    /// Create a record. Offline-writable entities return an optimistic
    /// record with a temp id when the remote cannot be reached.
    pub async fn create(&self, payload: Record) -> Result<Record> {
        if self.monitor.is_online() && !self.waits_on_temp(&payload) {
            match self.remote().create(&payload.payload()).await {
                Ok(created) if created.id().is_none() => {
                    return Err(RemoteError::InvalidResponse(
                        "create response has no id".to_string(),
                    )
                    .into());
                }
                Ok(created) => {
                    let table = self.table();
                    return self.db.transaction(|tx| store::put_confirmed(tx, table, &created));
                }
                Err(e) => self.fall_back("create", e)?,
            }
        } else {
            self.guard_offline()?;
        }
        self.create_offline(payload)
    }

    /// Apply a partial update and return the resulting record.
    pub async fn update(&self, id: &str, patch: Record) -> Result<Record> {
        if self.routes_remote(id)? && !self.waits_on_temp(&patch) {
            match self.remote().update(id, &patch.payload()).await {
                Ok(updated) => {
                    let mut updated = updated;
                    updated.set_id(id);
                    let table = self.table();
                    return self.db.transaction(|tx| store::put_confirmed(tx, table, &updated));
                }
                Err(e) => self.fall_back("update", e)?,
            }
        } else {
            self.guard_offline()?;
        }
        self.update_offline(id, patch)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.routes_remote(id)? {
            match self.remote().delete(id).await {
                Ok(()) => return self.store.remove(self.table(), id),
                Err(e) if e.is_not_found() => return self.store.remove(self.table(), id),
                Err(e) => self.fall_back("delete", e)?,
            }
        } else {
            self.guard_offline()?;
        }
        self.delete_offline(id)
    }

    /// Online, a server id, and nothing queued for the record yet. Queued
    /// entries must replay before a direct write or per-record order breaks.
    fn routes_remote(&self, id: &str) -> Result<bool> {
        if !self.monitor.is_online() || is_temp_id(id) {
            return Ok(false);
        }
        if self.is_offline_writable() && self.queue.has_unsynced(self.name(), id)? {
            tracing::debug!(entity = self.name(), id, "record has queued changes, queueing");
            return Ok(false);
        }
        Ok(true)
    }

    /// A write that references an unsynced temp id must queue behind the
    /// create that resolves it.
    fn waits_on_temp(&self, payload: &Record) -> bool {
        if !self.is_offline_writable() {
            return false;
        }
        match payload.temp_ref() {
            Some(temp_id) => {
                tracing::debug!(entity = self.name(), temp_id, "references an unsynced record, queueing");
                true
            }
            None => false,
        }
    }

    fn guard_offline(&self) -> Result<()> {
        if self.is_offline_writable() {
            Ok(())
        } else {
            Err(Error::Connectivity {
                entity: self.name().to_string(),
            })
        }
    }

    /// Decide what a failed remote write becomes.
    ///
    /// An invalid response means the write reached the server, so it is
    /// never queued for a second replay.
    fn fall_back(&self, operation: &str, error: RemoteError) -> Result<()> {
        if !self.is_offline_writable() || matches!(error, RemoteError::InvalidResponse(_)) {
            return Err(error.into());
        }
        tracing::warn!(
            entity = self.name(),
            operation,
            error = %error,
            "remote write failed, queueing"
        );
        Ok(())
    }

    fn cache_fetched(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let table = self.table();
        let name = self.name();
        self.db.transaction(|tx| {
            let mut fetched = Vec::with_capacity(records.len());
            for mut record in records {
                if record.id().is_none() {
                    tracing::warn!(entity = name, "skipping fetched record without id");
                    continue;
                }
                if !store::cache_fetched(tx, table, &record)? {
                    tracing::debug!(entity = name, id = ?record.id(), "kept unsynced local copy");
                }
                record.mark_synced();
                fetched.push(record);
            }
            Ok(fetched)
        })
    }

    fn create_offline(&self, payload: Record) -> Result<Record> {
        let now = Utc::now();
        let temp_id = generate_temp_id(now);
        let mut record = payload.payload();
        record.set_id(&temp_id);
        if record.get(CREATED_AT_FIELD).is_none() {
            record.insert(CREATED_AT_FIELD, format_timestamp(now));
        }
        record.mark_offline(now);

        let (table, name) = (self.table(), self.name());
        self.db.transaction(|tx| {
            store::put_record(tx, table, &record)?;
            queue::append_in(tx, name, Operation::Create, &temp_id, &record.payload())?;
            Ok(())
        })?;
        tracing::info!(entity = name, id = %temp_id, "created offline");
        Ok(record)
    }

    fn update_offline(&self, id: &str, patch: Record) -> Result<Record> {
        let now = Utc::now();
        let patch = patch.payload();
        let (table, name) = (self.table(), self.name());
        let record = self.db.transaction(|tx| {
            let mut record =
                store::get_record(tx, table, id)?.ok_or_else(|| Error::NotFound {
                    entity: name.to_string(),
                    id: id.to_string(),
                })?;
            record.merge(&patch);
            record.set_id(id);
            record.mark_offline(now);
            store::put_record(tx, table, &record)?;

            if is_temp_id(id) {
                if !queue::amend_create_in(tx, name, id, &record.payload())? {
                    tracing::warn!(entity = name, id, "no queued create to amend");
                }
            } else {
                queue::append_in(tx, name, Operation::Update, id, &patch)?;
            }
            Ok(record)
        })?;
        tracing::info!(entity = name, id, "updated offline");
        Ok(record)
    }

    fn delete_offline(&self, id: &str) -> Result<()> {
        let (table, name) = (self.table(), self.name());
        self.db.transaction(|tx| {
            if store::get_record(tx, table, id)?.is_none() {
                return Err(Error::NotFound {
                    entity: name.to_string(),
                    id: id.to_string(),
                });
            }
            store::remove_record(tx, table, id)?;
            if is_temp_id(id) {
                let cancelled = queue::cancel_in(tx, name, id)?;
                tracing::debug!(entity = name, id, cancelled, "cancelled queued create");
            } else {
                queue::append_in(tx, name, Operation::Delete, id, &Record::new())?;
            }
            Ok(())
        })?;
        tracing::info!(entity = name, id, "deleted offline");
        Ok(())
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
