// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cx_core::EntryStatus;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::display::format_time;
use crate::error::Result;
use crate::session::Session;

use super::print_json;

#[derive(Debug, Serialize)]
struct StatusJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<String>,
    connection: &'static str,
    database: String,
    pending: BTreeMap<String, i64>,
    errors: BTreeMap<String, i64>,
    blocking: usize,
    last_fetched: BTreeMap<String, DateTime<Utc>>,
}

/// `entity count, entity count` or `none`.
fn format_counts(counts: &BTreeMap<String, i64>) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .map(|(entity, count)| format!("{entity} {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn run(session: &Session, format: OutputFormat) -> Result<()> {
    session.connect().await;

    let queue = session.engine.queue();
    let store = session.engine.store();
    let mut last_fetched = BTreeMap::new();
    for name in session.engine.registry().names() {
        if let Some(at) = store.last_fetched(name)? {
            last_fetched.insert(name.to_string(), at);
        }
    }

    let status = StatusJson {
        remote: session.backend.as_ref().map(|b| b.base_url().to_string()),
        connection: session.connection_label(),
        database: session.config.database_path().display().to_string(),
        pending: queue.pending_counts()?,
        errors: queue.counts(EntryStatus::Error)?,
        blocking: queue.blocking_keys()?.len(),
        last_fetched,
    };

    match format {
        OutputFormat::Json => print_json(&status),
        OutputFormat::Text => {
            match &status.remote {
                Some(url) => println!("remote:    {url} ({})", status.connection),
                None => println!("remote:    {}", status.connection),
            }
            println!("database:  {}", status.database);
            println!("pending:   {}", format_counts(&status.pending));
            println!("errors:    {}", format_counts(&status.errors));
            if status.blocking > 0 {
                println!(
                    "blocked:   {} record(s) wait on a rejected entry\n  hint: see 'caixa queue --status error'",
                    status.blocking
                );
            }
            if !status.last_fetched.is_empty() {
                println!("last fetched:");
                for (entity, at) in &status.last_fetched {
                    println!("  {entity:<24} {}", format_time(*at));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
