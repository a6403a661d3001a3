// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use cx_core::Predicate;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::display::format_record_line;
use crate::error::Result;
use crate::session::Session;

use super::print_json;

/// Build an exact-match predicate from `field=value` conditions.
pub(crate) fn predicate(conditions: Vec<(String, Value)>) -> Predicate {
    conditions
        .into_iter()
        .fold(Predicate::new(), |predicate, (field, value)| {
            predicate.with(field, value)
        })
}

pub async fn run(
    session: &Session,
    entity: &str,
    conditions: Vec<(String, Value)>,
    format: OutputFormat,
) -> Result<()> {
    let gateway = session.engine.gateway(entity)?;
    session.connect().await;

    let records = if conditions.is_empty() {
        gateway.list().await?
    } else {
        gateway.filter(&predicate(conditions)).await?
    };

    match format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text => {
            for record in &records {
                println!("{}", format_record_line(record));
            }
            Ok(())
        }
    }
}
