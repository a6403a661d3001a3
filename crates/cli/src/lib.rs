// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! cxrs - operator CLI for the caixa offline-first sync engine.
//!
//! This crate wires the [`cx_core`] engine to a configuration file, a
//! stderr logger and a set of commands for inspecting the local cache and
//! the sync queue.
//!
//! # Main Components
//!
//! - [`Config`] - `caixa.toml`: database path, remote URL, connectivity tuning
//! - [`Cli`] - command-line surface
//! - [`Error`] - Error types for all commands
//!
//! ```rust,ignore
//! use clap::Parser;
//!
//! let cli = cxrs::Cli::parse_from(["caixa", "queue", "--status", "error"]);
//! cxrs::run(cli)?;
//! ```

mod cli;
mod commands;
mod display;
mod session;

pub mod config;
pub mod error;
pub mod logging;

pub use cli::{Cli, Command, OutputFormat, QueueCommand, StatusArg};
pub use config::{Config, ConnectivityConfig, RemoteConfig};
pub use error::{Error, Result};

use session::Session;

/// Execute a CLI invocation: set up logging, load the config, run the command.
pub fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose);
    let config = Config::discover(cli.config.as_deref())?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(dispatch(config, cli.command))
}

async fn dispatch(config: Config, command: Command) -> Result<()> {
    let session = Session::open(config)?;
    match command {
        Command::Entities { output } => commands::entities::run(&session, output),
        Command::Status { output } => commands::status::run(&session, output).await,
        Command::Queue {
            command,
            status,
            output,
        } => commands::queue::run(&session, command, status, output),
        Command::Sync { output } => commands::sync::run(&session, output).await,
        Command::List {
            entity,
            conditions,
            output,
        } => commands::list::run(&session, &entity, conditions, output).await,
        Command::Get { entity, id } => commands::get::run(&session, &entity, &id).await,
        Command::Watch { retry_every } => commands::watch::run(&session, retry_every).await,
    }
}
