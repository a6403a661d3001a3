// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use cx_core::{
    retail_registry, ConnectivityMonitor, HttpBackend, Record, RemoteApi, SyncEngine,
};

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// Nothing listens here; only used to satisfy the registry.
const DEAD_REMOTE: &str = "http://127.0.0.1:9";

const OFFLINE_CONFIG: &str = "\
database = \"caixa.db\"

[connectivity]
offline = true
";

pub fn caixa() -> Command {
    cargo_bin_cmd!("caixa")
}

/// A temp directory holding an offline `caixa.toml` and its database.
pub struct Workspace {
    pub temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("caixa.toml"), OFFLINE_CONFIG).unwrap();
        Workspace { temp }
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp.path().join("caixa.toml")
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp.path().join("caixa.db")
    }

    /// `caixa --config <workspace config>` run inside the workspace.
    pub fn cmd(&self) -> Command {
        let mut cmd = caixa();
        cmd.current_dir(self.temp.path())
            .env_remove("CAIXA_LOG")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }

    /// Engine on the workspace database, offline.
    pub fn engine(&self) -> SyncEngine {
        let backend = HttpBackend::new(DEAD_REMOTE, Duration::from_secs(1)).unwrap();
        let registry =
            retail_registry(|name| -> Arc<dyn RemoteApi> { Arc::new(backend.resource(name)) })
                .unwrap();
        SyncEngine::open(
            &self.db_path(),
            registry,
            Arc::new(ConnectivityMonitor::new(false)),
        )
        .unwrap()
    }

    /// Create a record offline through the gateway; returns its temp id.
    pub fn create_offline(&self, entity: &str, fields: serde_json::Value) -> String {
        let engine = self.engine();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let record = runtime
            .block_on(
                engine
                    .gateway(entity)
                    .unwrap()
                    .create(Record::from_value(fields).unwrap()),
            )
            .unwrap();
        record.id().unwrap()
    }

    /// Put records straight into the cache, as if fetched earlier.
    pub fn seed_cache(&self, table: &str, records: Vec<serde_json::Value>) {
        let records: Vec<Record> = records
            .into_iter()
            .map(|r| Record::from_value(r).unwrap())
            .collect();
        self.engine().store().put_many(table, &records).unwrap();
    }
}

/// Captured stdout as a string.
pub fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}
