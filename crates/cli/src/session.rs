// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Opening the engine from the operator configuration.

use std::fs;
use std::sync::Arc;

use cx_core::{
    retail_registry, ConnectivityMonitor, HttpBackend, Predicate, Record, RemoteApi, RemoteError,
    RemoteFuture, SyncEngine,
};

use crate::config::Config;
use crate::error::Result;

/// Remote used when no backend is configured: always unreachable.
#[derive(Debug, Clone, Copy)]
struct Unconfigured;

impl Unconfigured {
    fn fail<'a, T: Send + 'a>(&self) -> RemoteFuture<'a, T> {
        Box::pin(std::future::ready(Err(RemoteError::Network(
            "no remote configured".to_string(),
        ))))
    }
}

impl RemoteApi for Unconfigured {
    fn list(&self) -> RemoteFuture<'_, Vec<Record>> {
        self.fail()
    }

    fn get(&self, _id: &str) -> RemoteFuture<'_, Record> {
        self.fail()
    }

    fn filter(&self, _predicate: &Predicate) -> RemoteFuture<'_, Vec<Record>> {
        self.fail()
    }

    fn create(&self, _payload: &Record) -> RemoteFuture<'_, Record> {
        self.fail()
    }

    fn update(&self, _id: &str, _patch: &Record) -> RemoteFuture<'_, Record> {
        self.fail()
    }

    fn delete(&self, _id: &str) -> RemoteFuture<'_, ()> {
        self.fail()
    }
}

/// The engine plus the HTTP backend it talks to, if any.
pub struct Session {
    pub config: Config,
    pub engine: SyncEngine,
    pub backend: Option<HttpBackend>,
}

impl Session {
    /// Open the database and build the retail registry. Starts offline.
    pub fn open(config: Config) -> Result<Self> {
        let backend = config
            .active_remote()
            .map(|remote| HttpBackend::new(&remote.url, remote.timeout()))
            .transpose()?;

        let registry = retail_registry(|name| -> Arc<dyn RemoteApi> {
            match &backend {
                Some(backend) => Arc::new(backend.resource(name)),
                None => Arc::new(Unconfigured),
            }
        })?;

        let path = config.database_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        tracing::debug!(path = %path.display(), "opening database");
        let engine = SyncEngine::open(&path, registry, Arc::new(ConnectivityMonitor::new(false)))?;

        Ok(Session {
            config,
            engine,
            backend,
        })
    }

    /// Probe the backend once and record the result. False without a backend.
    pub async fn connect(&self) -> bool {
        let online = match &self.backend {
            Some(backend) => backend.probe().await,
            None => false,
        };
        self.engine.monitor().set_online(online);
        online
    }

    /// Human-readable connection state for the last probe.
    pub fn connection_label(&self) -> &'static str {
        match (&self.backend, self.engine.is_online()) {
            (None, _) if self.config.connectivity.offline => "forced offline",
            (None, _) => "not configured",
            (Some(_), true) => "online",
            (Some(_), false) => "unreachable",
        }
    }
}
