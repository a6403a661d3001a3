// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replays the sync queue against the remote.
//!
//! A drain snapshots the drainable entries and walks them in FIFO order. One
//! failure never stops the drain; it holds back later entries for the same
//! record so per-record order is kept. Only one drain runs at a time; a
//! trigger that arrives mid-drain is dropped.
//!
//! When a create lands, its temp id is replaced by the server id everywhere:
//! the record's own row and queue entries, plus any queued payload or cached
//! offline-writable row that references it. Entries that still reference an
//! unsynced temp id are held until that create lands.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::id::is_temp_id;
use crate::queue::{self, EntryStatus, Operation, QueueEntry, SyncQueue};
use crate::record::Record;
use crate::registry::{EntityDescriptor, Registry};
use crate::remote::RemoteError;
use crate::store;

/// Synced entries older than this are pruned after each drain.
pub const SYNCED_RETENTION_DAYS: i64 = 7;

/// An entry that failed during a drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub entry_id: i64,
    pub entity: String,
    pub entity_id: String,
    pub operation: Operation,
    pub error: String,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    /// Skipped because an earlier entry for the same record is unresolved.
    pub held: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.held == 0
    }
}

/// Broadcast to listeners after each drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Completed(SyncReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    Idle,
    Draining,
}

/// Resets the draining flag when the drain ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the queue. One instance per database.
#[derive(Debug)]
pub struct Reconciler {
    registry: Arc<Registry>,
    db: Database,
    queue: SyncQueue,
    draining: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

impl Reconciler {
    pub fn new(registry: Arc<Registry>, db: Database) -> Self {
        let (events, _) = broadcast::channel(16);
        Reconciler {
            registry,
            queue: SyncQueue::new(db.clone()),
            db,
            draining: AtomicBool::new(false),
            events,
        }
    }

    pub fn state(&self) -> ReconcilerState {
        if self.is_syncing() {
            ReconcilerState::Draining
        } else {
            ReconcilerState::Idle
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Run one drain. Returns `None` when a drain is already running.
    ///
    /// Remote failures are recorded on their entries and reported; only
    /// local storage errors are returned as `Err`.
    pub async fn drain(&self) -> Result<Option<SyncReport>> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("drain already running");
            return Ok(None);
        }
        let _guard = DrainGuard(&self.draining);

        let snapshot = self.queue.drainable()?;
        let mut blocked = self.queue.blocking_keys()?;
        let mut report = SyncReport::default();
        if !snapshot.is_empty() {
            tracing::info!(entries = snapshot.len(), "draining sync queue");
        }

        for snapshotted in snapshot {
            // Earlier steps may have retargeted, cancelled or synced it.
            let Some(entry) = self.db.with_conn(|conn| queue::get_in(conn, snapshotted.id))? else {
                continue;
            };
            if entry.status == EntryStatus::Synced {
                continue;
            }
            if blocked.contains(&entry.key()) {
                report.held += 1;
                continue;
            }
            if entry.operation != Operation::Create && is_temp_id(&entry.entity_id) {
                // No create ahead of it can assign the server id.
                report.held += 1;
                blocked.insert(entry.key());
                continue;
            }
            if let Some(waiting_on) = entry.payload.temp_ref() {
                // References a record whose create has not synced yet.
                tracing::debug!(entry = entry.id, waiting_on, "held for an unsynced reference");
                report.held += 1;
                blocked.insert(entry.key());
                continue;
            }

            let descriptor = match self.registry.get(&entry.entity) {
                Ok(descriptor) => Arc::clone(descriptor),
                Err(e) => {
                    self.queue.mark_rejected(entry.id, &e.to_string())?;
                    self.record_failure(&mut report, &mut blocked, &entry, e.to_string());
                    continue;
                }
            };

            match self.apply(&descriptor, &entry).await {
                Ok(()) => report.synced += 1,
                Err(Error::Remote(e)) => {
                    tracing::warn!(
                        entry = entry.id,
                        entity = %entry.entity,
                        id = %entry.entity_id,
                        operation = %entry.operation,
                        error = %e,
                        "replay failed"
                    );
                    self.queue.mark_error(entry.id, &e)?;
                    self.record_failure(&mut report, &mut blocked, &entry, e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        let pruned = self
            .queue
            .prune_synced_before(Utc::now() - chrono::Duration::days(SYNCED_RETENTION_DAYS))?;
        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            held = report.held,
            pruned,
            "drain complete"
        );
        let _ = self.events.send(SyncEvent::Completed(report.clone()));
        Ok(Some(report))
    }

    fn record_failure(
        &self,
        report: &mut SyncReport,
        blocked: &mut HashSet<(String, String)>,
        entry: &QueueEntry,
        error: String,
    ) {
        report.failed += 1;
        report.failures.push(SyncFailure {
            entry_id: entry.id,
            entity: entry.entity.clone(),
            entity_id: entry.entity_id.clone(),
            operation: entry.operation,
            error,
        });
        blocked.insert(entry.key());
    }

    async fn apply(&self, descriptor: &EntityDescriptor, entry: &QueueEntry) -> Result<()> {
        match entry.operation {
            Operation::Create => self.apply_create(descriptor, entry).await,
            Operation::Update => self.apply_update(descriptor, entry).await,
            Operation::Delete => self.apply_delete(descriptor, entry).await,
        }
    }

    /// Replay a create, then move the record to its server id.
    async fn apply_create(&self, descriptor: &EntityDescriptor, entry: &QueueEntry) -> Result<()> {
        let created = descriptor.remote.create(&entry.payload).await?;
        let server_id = created.id().ok_or_else(|| {
            RemoteError::InvalidResponse("create response has no id".to_string())
        })?;
        let (table, temp_id) = (descriptor.table.as_str(), entry.entity_id.as_str());

        self.db.transaction(|tx| {
            match queue::get_in(tx, entry.id)? {
                None => {
                    // Deleted locally while the create was in flight.
                    queue::append_in(tx, &entry.entity, Operation::Delete, &server_id, &Record::new())?;
                }
                Some(current) => {
                    let local = store::get_record(tx, table, temp_id)?;
                    if current.payload != entry.payload {
                        // Amended while the create was in flight; ship the newer fields.
                        queue::append_in(tx, &entry.entity, Operation::Update, temp_id, &current.payload)?;
                        if let Some(mut local) = local {
                            local.set_id(&server_id);
                            store::rekey_record(tx, table, temp_id, &local)?;
                        }
                    } else if local.is_some() {
                        store::remove_record(tx, table, temp_id)?;
                        store::put_confirmed(tx, table, &created)?;
                    }
                    queue::retarget_in(tx, &entry.entity, temp_id, &server_id)?;
                    queue::mark_synced_in(tx, entry.id)?;
                }
            }

            // Other records may point at the temp id, e.g. a sale's customer_id.
            queue::rewrite_refs_in(tx, temp_id, &server_id)?;
            for writable in self.registry.descriptors().filter(|d| d.offline_writable) {
                store::rewrite_refs_in(tx, &writable.table, temp_id, &server_id)?;
            }
            Ok(())
        })?;

        tracing::info!(entity = %entry.entity, temp_id, server_id = %server_id, "create synced");
        Ok(())
    }

    async fn apply_update(&self, descriptor: &EntityDescriptor, entry: &QueueEntry) -> Result<()> {
        let mut updated = descriptor
            .remote
            .update(&entry.entity_id, &entry.payload)
            .await?;
        updated.set_id(&entry.entity_id);
        let table = descriptor.table.as_str();

        self.db.transaction(|tx| {
            // Later local changes win over the response until they replay too.
            if !queue::has_later_unsynced_in(tx, entry)? {
                store::put_confirmed(tx, table, &updated)?;
            }
            queue::mark_synced_in(tx, entry.id)
        })
    }

    async fn apply_delete(&self, descriptor: &EntityDescriptor, entry: &QueueEntry) -> Result<()> {
        match descriptor.remote.delete(&entry.entity_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(entity = %entry.entity, id = %entry.entity_id, "already deleted remotely");
            }
            Err(e) => return Err(e.into()),
        }
        let table = descriptor.table.as_str();
        self.db.transaction(|tx| {
            if !queue::has_later_unsynced_in(tx, entry)? {
                store::remove_record(tx, table, &entry.entity_id)?;
            }
            queue::mark_synced_in(tx, entry.id)
        })
    }

    async fn drain_logged(&self) {
        match self.drain().await {
            Ok(Some(report)) if !report.is_clean() => {
                tracing::warn!(failed = report.failed, held = report.held, "drain left entries behind");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "drain aborted"),
        }
    }

    /// Drain now if online, then on every reconnect until `cancel` fires.
    ///
    /// With `retry_every`, also drain periodically while online so entries
    /// that hit a server error are retried without waiting for a reconnect.
    pub async fn run(
        self: Arc<Self>,
        monitor: Arc<ConnectivityMonitor>,
        cancel: CancellationToken,
        retry_every: Option<Duration>,
    ) {
        let mut events = monitor.subscribe();
        let mut ticker = retry_every.map(|every| {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker
        });

        if monitor.is_online() {
            self.drain_logged().await;
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                event = events.recv() => match event {
                    Ok(ConnectivityEvent::WentOnline) => self.drain_logged().await,
                    Ok(ConnectivityEvent::WentOffline) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if monitor.is_online() {
                            self.drain_logged().await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                _ = tick(&mut ticker) => {
                    if monitor.is_online() {
                        self.drain_logged().await;
                    }
                }
            }
        }
    }
}

/// Wait for the next tick, or forever without a ticker.
async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
