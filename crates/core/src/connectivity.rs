// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Online/offline state shared by gateways and the reconciler.
//!
//! Gateways read the flag at call time, so routing follows the latest
//! signal. Transitions are broadcast to subscribers; repeated signals with
//! the same value are swallowed.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A change in connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    WentOnline,
    WentOffline,
}

/// Current connectivity plus a transition channel.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (events, _) = broadcast::channel(16);
        ConnectivityMonitor {
            online: AtomicBool::new(online),
            events,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Record the latest signal. Returns the event emitted, if any.
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        let was = self.online.swap(online, Ordering::AcqRel);
        if was == online {
            return None;
        }
        let event = if online {
            ConnectivityEvent::WentOnline
        } else {
            ConnectivityEvent::WentOffline
        };
        tracing::info!(?event, "connectivity changed");
        // No receivers is fine; nobody is listening yet.
        let _ = self.events.send(event);
        Some(event)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Probe the remote every `interval` and feed the result to `monitor`.
///
/// The first probe runs immediately. The task ends when `cancel` fires.
pub fn spawn_heartbeat<F, Fut>(
    monitor: Arc<ConnectivityMonitor>,
    interval: Duration,
    cancel: CancellationToken,
    probe: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let online = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                online = probe() => online,
            };
            tracing::debug!(online, "heartbeat");
            monitor.set_online(online);
        }
    })
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
