// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod entities;
pub mod get;
pub mod list;
pub mod queue;
pub mod status;
pub mod sync;
pub mod watch;

use serde::Serialize;

use crate::error::Result;

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
