// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;

use cx_core::SyncReport;

use crate::cli::OutputFormat;
use crate::display::format_report;
use crate::error::{Error, Result};
use crate::session::Session;

use super::print_json;

#[derive(Debug, Serialize)]
struct SyncJson {
    online: bool,
    /// Absent when offline or when another drain was running.
    report: Option<SyncReport>,
    pending: i64,
}

pub async fn run(session: &Session, format: OutputFormat) -> Result<()> {
    if session.backend.is_none() {
        return Err(Error::NoRemote);
    }

    let online = session.connect().await;
    let report = if online {
        session.engine.sync_now().await?
    } else {
        None
    };
    let pending: i64 = session.engine.pending_counts()?.values().sum();

    match format {
        OutputFormat::Json => print_json(&SyncJson {
            online,
            report,
            pending,
        }),
        OutputFormat::Text => {
            match (online, &report) {
                (false, _) => println!("remote unreachable; {pending} entries pending"),
                (true, None) => println!("a sync is already running"),
                (true, Some(report)) => {
                    for line in format_report(report) {
                        println!("{line}");
                    }
                    if pending > 0 {
                        println!("{pending} entries still pending");
                    }
                }
            }
            Ok(())
        }
    }
}
