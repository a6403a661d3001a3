// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use cx_core::{spawn_heartbeat, ConnectivityEvent, SyncEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::display::format_report;
use crate::error::{Error, Result};
use crate::session::Session;

/// Retry interval: the flag wins over the config; 0 disables.
fn retry_interval(flag: Option<u64>, configured: Option<Duration>) -> Option<Duration> {
    match flag {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => configured,
    }
}

pub async fn run(session: &Session, retry_every: Option<u64>) -> Result<()> {
    let Some(backend) = session.backend.clone() else {
        return Err(Error::NoRemote);
    };
    let monitor = Arc::clone(session.engine.monitor());
    let mut connectivity = monitor.subscribe();
    let mut reports = session.engine.subscribe();
    let cancel = CancellationToken::new();

    println!("watching {} (Ctrl-C to stop)", backend.base_url());

    let heartbeat = match session.config.connectivity.heartbeat_interval() {
        Some(interval) => Some(spawn_heartbeat(
            Arc::clone(&monitor),
            interval,
            cancel.clone(),
            move || {
                let backend = backend.clone();
                async move { backend.probe().await }
            },
        )),
        None => {
            session.connect().await;
            None
        }
    };
    let retry = retry_interval(retry_every, session.config.connectivity.retry_interval());
    let reconciler = session.engine.spawn_reconciler(cancel.clone(), retry);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            event = connectivity.recv() => match event {
                Ok(ConnectivityEvent::WentOnline) => println!("online"),
                Ok(ConnectivityEvent::WentOffline) => {
                    let pending: i64 = session.engine.pending_counts()?.values().sum();
                    println!("offline ({pending} entries pending)");
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            event = reports.recv() => match event {
                Ok(SyncEvent::Completed(report)) => {
                    for line in format_report(&report) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    cancel.cancel();
    if let Some(heartbeat) = heartbeat {
        let _ = heartbeat.await;
    }
    let _ = reconciler.await;
    println!("stopped");
    Ok(())
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
