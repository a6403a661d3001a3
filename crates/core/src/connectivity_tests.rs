// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::sync::atomic::AtomicUsize;

#[test]
fn initial_state() {
    assert!(ConnectivityMonitor::new(true).is_online());
    assert!(!ConnectivityMonitor::new(false).is_online());
    assert!(!ConnectivityMonitor::default().is_online());
}

#[test]
fn emits_only_on_transitions() {
    let monitor = ConnectivityMonitor::new(false);
    let mut events = monitor.subscribe();

    assert_eq!(monitor.set_online(false), None);
    assert_eq!(
        monitor.set_online(true),
        Some(ConnectivityEvent::WentOnline)
    );
    assert_eq!(monitor.set_online(true), None);
    assert_eq!(
        monitor.set_online(false),
        Some(ConnectivityEvent::WentOffline)
    );

    assert_eq!(events.try_recv().unwrap(), ConnectivityEvent::WentOnline);
    assert_eq!(events.try_recv().unwrap(), ConnectivityEvent::WentOffline);
    assert!(events.try_recv().is_err());
}

#[test]
fn set_online_without_subscribers() {
    let monitor = ConnectivityMonitor::new(false);
    monitor.set_online(true);
    assert!(monitor.is_online());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_feeds_probe_results() {
    let monitor = Arc::new(ConnectivityMonitor::new(false));
    let mut events = monitor.subscribe();
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let probe_calls = Arc::clone(&calls);
    let handle = spawn_heartbeat(
        Arc::clone(&monitor),
        Duration::from_secs(5),
        cancel.clone(),
        move || {
            // online, online, offline, ...
            let n = probe_calls.fetch_add(1, Ordering::SeqCst);
            async move { n < 2 }
        },
    );

    assert_eq!(events.recv().await.unwrap(), ConnectivityEvent::WentOnline);
    assert_eq!(events.recv().await.unwrap(), ConnectivityEvent::WentOffline);
    assert!(calls.load(Ordering::SeqCst) >= 3);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_on_cancel() {
    let monitor = Arc::new(ConnectivityMonitor::new(true));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let handle = spawn_heartbeat(monitor, Duration::from_secs(1), cancel, || async { false });
    handle.await.unwrap();
}
