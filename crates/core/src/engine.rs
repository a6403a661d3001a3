// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Session object tying the pieces together.
//!
//! A `SyncEngine` owns the database, the registry, the connectivity monitor
//! and the single reconciler for that database, and hands out gateways.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connectivity::ConnectivityMonitor;
use crate::db::Database;
use crate::error::Result;
use crate::gateway::EntityGateway;
use crate::queue::SyncQueue;
use crate::reconciler::{Reconciler, SyncEvent, SyncReport};
use crate::registry::Registry;
use crate::store::LocalStore;

#[derive(Debug, Clone)]
pub struct SyncEngine {
    db: Database,
    registry: Arc<Registry>,
    monitor: Arc<ConnectivityMonitor>,
    reconciler: Arc<Reconciler>,
}

impl SyncEngine {
    /// Open the database at `path`, migrating it to the registry's schema.
    pub fn open(
        path: &Path,
        registry: Registry,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Result<Self> {
        let db = Database::open(path, &registry.schema())?;
        Ok(Self::with_database(db, registry, monitor))
    }

    pub fn open_in_memory(registry: Registry, monitor: Arc<ConnectivityMonitor>) -> Result<Self> {
        let db = Database::open_in_memory(&registry.schema())?;
        Ok(Self::with_database(db, registry, monitor))
    }

    fn with_database(db: Database, registry: Registry, monitor: Arc<ConnectivityMonitor>) -> Self {
        let registry = Arc::new(registry);
        SyncEngine {
            reconciler: Arc::new(Reconciler::new(Arc::clone(&registry), db.clone())),
            db,
            registry,
            monitor,
        }
    }

    /// Gateway for a registered entity.
    pub fn gateway(&self, entity: &str) -> Result<EntityGateway> {
        let descriptor = self.registry.get(entity)?;
        Ok(EntityGateway::new(
            Arc::clone(descriptor),
            self.db.clone(),
            Arc::clone(&self.monitor),
        ))
    }

    /// Drain the queue now, if online. `None` when offline or already draining.
    pub async fn sync_now(&self) -> Result<Option<SyncReport>> {
        if !self.monitor.is_online() {
            tracing::debug!("offline, not draining");
            return Ok(None);
        }
        self.reconciler.drain().await
    }

    /// Run the reconciler in the background until `cancel` fires.
    pub fn spawn_reconciler(
        &self,
        cancel: CancellationToken,
        retry_every: Option<Duration>,
    ) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.reconciler).run(
            Arc::clone(&self.monitor),
            cancel,
            retry_every,
        ))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.reconciler.subscribe()
    }

    /// Pending queue entries per entity.
    pub fn pending_counts(&self) -> Result<BTreeMap<String, i64>> {
        self.queue().pending_counts()
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn store(&self) -> LocalStore {
        LocalStore::new(self.db.clone())
    }

    pub fn queue(&self) -> SyncQueue {
        SyncQueue::new(self.db.clone())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
