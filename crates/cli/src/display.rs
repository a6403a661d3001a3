// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Local, Utc};
use cx_core::{QueueEntry, Record, SyncReport};

/// Maximum width of a shown error message before it is cut.
const ERROR_WIDTH: usize = 60;

/// Format a timestamp in local time for listings.
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Shorten `text` to `width` characters, marking the cut with `...`.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// One queue entry per line.
///
/// ```text
/// #12  2026-01-10 10:30:00  create  sales/temp_1736504400000_k3j9x2  pending
/// #13  2026-01-10 10:31:12  update  customers/42  error (3 attempts, blocking): rejected (HTTP 422)
/// ```
pub fn format_entry_line(entry: &QueueEntry) -> String {
    let mut line = format!(
        "#{}  {}  {}  {}/{}  {}",
        entry.id,
        format_time(entry.created_at),
        entry.operation,
        entry.entity,
        entry.entity_id,
        entry.status
    );
    if entry.attempts > 0 || entry.last_error.is_some() {
        let plural = if entry.attempts == 1 { "" } else { "s" };
        line.push_str(&format!(" ({} attempt{plural}", entry.attempts));
        if entry.is_blocking() {
            line.push_str(", blocking");
        }
        line.push(')');
    }
    if let Some(error) = &entry.last_error {
        line.push_str(": ");
        line.push_str(&truncate(error, ERROR_WIDTH));
    }
    line
}

/// One record per line: id, a marker for unsynced rows, then the fields.
pub fn format_record_line(record: &Record) -> String {
    let id = record.id().unwrap_or_else(|| "?".to_string());
    let marker = if record.is_synced() { "" } else { " *" };
    let mut fields = record.payload();
    fields.remove(cx_core::record::UPDATED_AT_FIELD);
    fields.remove(cx_core::record::CREATED_AT_FIELD);
    let body = serde_json::to_string(fields.fields()).unwrap_or_default();
    format!("{id}{marker}  {body}")
}

/// Summary lines of one drain.
pub fn format_report(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "synced {}, failed {}, held back {}",
        report.synced, report.failed, report.held
    )];
    for failure in &report.failures {
        lines.push(format!(
            "  #{} {} {}/{}: {}",
            failure.entry_id,
            failure.operation,
            failure.entity,
            failure.entity_id,
            truncate(&failure.error, ERROR_WIDTH)
        ));
    }
    lines
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
