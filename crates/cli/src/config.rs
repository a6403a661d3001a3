// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operator configuration.
//!
//! Configuration lives in `caixa.toml` and includes:
//! - `database`: path of the SQLite cache (relative to the config file)
//! - `[remote]`: base URL and request timeout of the backend
//! - `[connectivity]`: heartbeat interval, retry interval and forced offline mode
//!
//! Without any config file the CLI runs against the default database with no
//! remote, which is enough to inspect the cache and the queue.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "caixa.toml";
const APP_DIR_NAME: &str = "caixa";
const DB_FILE_NAME: &str = "caixa.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Database path; relative paths resolve against the config file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    /// Backend; absent means the CLI never goes online.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    /// File this config was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL; each entity is the collection `{url}/{entity}`.
    pub url: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Heartbeat probe interval in milliseconds (default: 15000). 0 = disabled.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Seconds between retries of failed entries while online (default: 60).
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Never contact the remote, even when one is configured.
    #[serde(default)]
    pub offline: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        ConnectivityConfig {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            retry_interval_secs: default_retry_interval_secs(),
            offline: false,
        }
    }
}

impl ConnectivityConfig {
    /// `None` when the heartbeat is disabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }

    /// `None` when periodic retries are disabled.
    pub fn retry_interval(&self) -> Option<Duration> {
        (self.retry_interval_secs > 0).then(|| Duration::from_secs(self.retry_interval_secs))
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_heartbeat_interval_ms() -> u64 {
    15_000
}

fn default_retry_interval_secs() -> u64 {
    60
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        if let Some(remote) = &config.remote {
            if remote.url.trim().is_empty() {
                return Err(Error::Config("remote.url cannot be empty".to_string()));
            }
        }
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Find and load the configuration.
    ///
    /// An explicit path must exist. Otherwise `./caixa.toml` wins over
    /// `$XDG_CONFIG_HOME/caixa/config.toml`, and with neither present the
    /// defaults apply.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::discover_in(explicit, &cwd, config_home().as_deref())
    }

    pub(crate) fn discover_in(
        explicit: Option<&Path>,
        cwd: &Path,
        config_home: Option<&Path>,
    ) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(Error::ConfigNotFound(path.display().to_string()));
            }
            return Self::load(path);
        }

        let local = cwd.join(CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::load(&local);
        }

        if let Some(home) = config_home {
            let user = home.join(APP_DIR_NAME).join("config.toml");
            if user.is_file() {
                return Self::load(&user);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self
                .source
                .as_deref()
                .and_then(Path::parent)
                .unwrap_or_else(|| Path::new("."))
                .join(path),
            None => data_dir().join(DB_FILE_NAME),
        }
    }

    /// Remote URL, unless forced offline or not configured.
    pub fn active_remote(&self) -> Option<&RemoteConfig> {
        if self.connectivity.offline {
            None
        } else {
            self.remote.as_ref()
        }
    }
}

/// `$XDG_CONFIG_HOME`, falling back to the platform config dir.
fn config_home() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
}

/// Default directory for the database.
fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME").filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir).join(APP_DIR_NAME);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
