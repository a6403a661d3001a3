// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for cx-core operations.

use thiserror::Error;

use crate::remote::RemoteError;

/// All possible errors that can occur in cx-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot modify {entity} while offline\n  hint: {entity} is read-only without a connection; reconnect and retry")]
    Connectivity { entity: String },

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("unknown entity: '{0}'")]
    UnknownEntity(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("database schema version {found} is newer than supported version {supported}\n  hint: upgrade caixa before opening this database")]
    SchemaVersion { found: i64, supported: i64 },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("queue entry not found: {0}")]
    EntryNotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("storage lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// The remote failure behind this error, if any.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Remote(e) => Some(e),
            _ => None,
        }
    }
}

/// A specialized Result type for cx-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
