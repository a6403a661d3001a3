// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::display::format_time;
use crate::error::Result;
use crate::session::Session;

use super::print_json;

/// JSON representation of one catalog entry.
#[derive(Debug, Serialize)]
pub(crate) struct EntityJson {
    pub name: String,
    pub table: String,
    pub offline_writable: bool,
    pub indexes: Vec<String>,
    pub cached: i64,
    pub pending: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetched: Option<DateTime<Utc>>,
}

pub(crate) fn collect(session: &Session) -> Result<Vec<EntityJson>> {
    let store = session.engine.store();
    let pending = session.engine.pending_counts()?;
    let mut entities = Vec::new();
    for descriptor in session.engine.registry().descriptors() {
        entities.push(EntityJson {
            name: descriptor.name.clone(),
            table: descriptor.table.clone(),
            offline_writable: descriptor.offline_writable,
            indexes: descriptor.indexes.clone(),
            cached: store.count(&descriptor.table)?,
            pending: pending.get(&descriptor.name).copied().unwrap_or(0),
            last_fetched: store.last_fetched(&descriptor.name)?,
        });
    }
    Ok(entities)
}

pub fn run(session: &Session, format: OutputFormat) -> Result<()> {
    let entities = collect(session)?;
    match format {
        OutputFormat::Json => print_json(&entities),
        OutputFormat::Text => {
            for entity in &entities {
                let mode = if entity.offline_writable { "rw" } else { "ro" };
                let mut line = format!(
                    "{:<24} {}  {:>6} cached",
                    entity.name, mode, entity.cached
                );
                if entity.pending > 0 {
                    line.push_str(&format!("  {} pending", entity.pending));
                }
                if let Some(at) = entity.last_fetched {
                    line.push_str(&format!("  fetched {}", format_time(at)));
                }
                println!("{line}");
            }
            Ok(())
        }
    }
}
