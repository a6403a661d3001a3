// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use cx_core::{EntryStatus, QueueEntry, SyncQueue};

use crate::cli::{OutputFormat, QueueCommand, StatusArg};
use crate::display::format_entry_line;
use crate::error::Result;
use crate::session::Session;

use super::print_json;

/// Entries to show: the given status, or everything not yet synced.
pub(crate) fn select(queue: &SyncQueue, status: Option<StatusArg>) -> Result<Vec<QueueEntry>> {
    let entries = match status {
        Some(status) => queue.list(Some(status.into()))?,
        None => queue
            .list(None)?
            .into_iter()
            .filter(|e| e.status != EntryStatus::Synced)
            .collect(),
    };
    Ok(entries)
}

pub fn run(
    session: &Session,
    command: Option<QueueCommand>,
    status: Option<StatusArg>,
    format: OutputFormat,
) -> Result<()> {
    let queue = session.engine.queue();
    match command {
        None => list(&queue, status, format),
        Some(QueueCommand::Retry { id }) => {
            let entry = queue.retry(id)?;
            match entry.status {
                EntryStatus::Synced => println!("#{id} is already synced"),
                _ => println!(
                    "#{id} {} {}/{} will be replayed on the next sync",
                    entry.operation, entry.entity, entry.entity_id
                ),
            }
            Ok(())
        }
        Some(QueueCommand::Discard { id }) => {
            let entry = queue.discard(id)?;
            tracing::info!(entry = id, entity = %entry.entity, id = %entry.entity_id, "discarded queue entry");
            println!(
                "discarded #{id} {} {}/{}",
                entry.operation, entry.entity, entry.entity_id
            );
            Ok(())
        }
        Some(QueueCommand::Prune) => {
            let pruned = queue.prune_synced()?;
            println!("pruned {pruned} synced entries");
            Ok(())
        }
    }
}

fn list(queue: &SyncQueue, status: Option<StatusArg>, format: OutputFormat) -> Result<()> {
    let entries = select(queue, status)?;
    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{}", format_entry_line(entry));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
