// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cx_core::EntryStatus;
use serde_json::Value;

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Queue entry status, as accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Error,
    Synced,
}

impl From<StatusArg> for EntryStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => EntryStatus::Pending,
            StatusArg::Error => EntryStatus::Error,
            StatusArg::Synced => EntryStatus::Synced,
        }
    }
}

/// Parse a `field=value` condition.
///
/// The value is read as a JSON scalar when it is one (`50`, `true`, `null`,
/// `"50"`); anything else is taken as a plain string.
pub fn parse_condition(s: &str) -> Result<(String, Value), String> {
    let (field, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{s}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err("field name cannot be empty".to_string());
    }
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) if !value.is_array() && !value.is_object() => value,
        _ => Value::String(raw.to_string()),
    };
    Ok((field.to_string(), value))
}

#[derive(Parser)]
#[command(name = "caixa")]
#[command(version)]
#[command(about = "Offline-first point-of-sale sync engine")]
#[command(
    long_about = "Offline-first point-of-sale sync engine.\n\n\
    Reads and writes go through a local SQLite cache; writes made while the\n\
    backend is unreachable are queued and replayed once it is back."
)]
pub struct Cli {
    /// Path to caixa.toml (default: ./caixa.toml, then $XDG_CONFIG_HOME/caixa/config.toml)
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Verbose logging (same as CAIXA_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the entity catalog with cached row counts
    Entities {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show connectivity, pending writes and last fetch times
    Status {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Inspect and manage the sync queue
    #[command(after_help = "\
Examples:
  caixa queue                     List unsynced entries
  caixa queue --status error      List failed entries
  caixa queue retry 12            Make entry 12 eligible again
  caixa queue discard 12          Drop entry 12 for good
  caixa queue prune               Delete synced entries")]
    Queue {
        #[command(subcommand)]
        command: Option<QueueCommand>,

        /// Only entries with this status (default: pending and error)
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Probe the remote and replay the queue once
    Sync {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// List records of an entity
    #[command(after_help = "\
Examples:
  caixa list products                          All products
  caixa list cash_registers -w status=aberto   Open registers
  caixa list sales -w customer_id=42 -o json   Sales of one customer")]
    List {
        /// Entity name (see `caixa entities`)
        entity: String,

        /// Exact-match condition, repeatable (field=value)
        #[arg(long = "where", short = 'w', value_name = "field=value", value_parser = parse_condition)]
        conditions: Vec<(String, Value)>,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show one record
    Get {
        /// Entity name
        entity: String,

        /// Record id (server id or temp id)
        id: String,
    },

    /// Keep the connection watched and the queue drained until Ctrl-C
    Watch {
        /// Seconds between retries of failed entries while online
        #[arg(long, value_name = "secs")]
        retry_every: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// Reset a failed entry so the next drain replays it
    Retry {
        /// Queue entry id
        id: i64,
    },

    /// Delete an entry without replaying it
    Discard {
        /// Queue entry id
        id: i64,
    },

    /// Delete all synced entries
    Prune,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
