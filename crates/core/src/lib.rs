// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cx-core: offline-first sync engine for the caixa point of sale
//!
//! This crate provides the local record cache, the durable mutation queue,
//! connectivity tracking and the reconciler that replays queued writes
//! against the remote backend once it is reachable again.

pub mod catalog;
pub mod connectivity;
pub mod db;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod id;
pub mod queue;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod remote;
pub mod schema;
pub mod store;

#[cfg(test)]
mod test_helpers;

pub use catalog::{retail_registry, CatalogEntry, CATALOG, CATALOG_VERSION};
pub use connectivity::{spawn_heartbeat, ConnectivityEvent, ConnectivityMonitor};
pub use db::Database;
pub use engine::SyncEngine;
pub use error::{Error, Result};
pub use gateway::EntityGateway;
pub use id::{generate_temp_id, is_temp_id};
pub use queue::{EntryStatus, Operation, QueueEntry, SyncQueue};
pub use reconciler::{Reconciler, ReconcilerState, SyncEvent, SyncFailure, SyncReport};
pub use record::{Predicate, Record};
pub use registry::{EntityDescriptor, Registry};
pub use remote::{HttpBackend, HttpRemote, RemoteApi, RemoteError, RemoteFuture, RemoteResult};
pub use schema::{Schema, TableSpec};
pub use store::LocalStore;
