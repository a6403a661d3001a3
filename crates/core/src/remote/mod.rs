// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote API abstraction.
//!
//! Each entity talks to its system of record through a [`RemoteApi`]. The
//! trait returns boxed futures so descriptors can hold `Arc<dyn RemoteApi>`
//! and tests can swap in an in-memory backend.

mod http;

use std::future::Future;
use std::pin::Pin;

use crate::record::{Predicate, Record};

pub use http::{HttpBackend, HttpRemote};

/// Error type for remote operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// No response: connection refused, DNS failure, timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The server failed (5xx).
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The server refused the request (4xx).
    #[error("rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server answered with something we cannot use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            RemoteError::Rejected { status, message }
        } else {
            RemoteError::Server { status, message }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Rejected { status: 404, .. })
    }

    /// The request never reached the server.
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Network(_))
    }

    /// Replaying the same mutation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Network(_) | RemoteError::Server { .. })
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by [`RemoteApi`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// Per-entity remote contract.
///
/// Implementations must not borrow the argument references in the returned
/// future; clone what they need first.
pub trait RemoteApi: Send + Sync {
    /// Fetch every record.
    fn list(&self) -> RemoteFuture<'_, Vec<Record>>;

    /// Fetch one record by server id.
    fn get(&self, id: &str) -> RemoteFuture<'_, Record>;

    /// Fetch records matching an exact-match predicate.
    fn filter(&self, predicate: &Predicate) -> RemoteFuture<'_, Vec<Record>>;

    /// Create a record; the response carries the server-assigned id.
    fn create(&self, payload: &Record) -> RemoteFuture<'_, Record>;

    /// Apply a partial update and return the resulting record.
    fn update(&self, id: &str, patch: &Record) -> RemoteFuture<'_, Record>;

    /// Delete a record.
    fn delete(&self, id: &str) -> RemoteFuture<'_, ()>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
