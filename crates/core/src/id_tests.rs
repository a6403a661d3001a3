// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;
use regex::Regex;
use yare::parameterized;

#[test]
fn generated_id_has_expected_shape() {
    let re = Regex::new(r"^temp_\d+_[a-z0-9]+$").unwrap();
    let id = generate_temp_id(Utc::now());
    assert!(re.is_match(&id), "unexpected temp id: {id}");
}

#[test]
fn generated_id_embeds_timestamp() {
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let id = generate_temp_id(at);
    assert!(id.starts_with(&format!("temp_{}_", at.timestamp_millis())));
}

#[test]
fn generated_ids_are_unique() {
    let now = Utc::now();
    let a = generate_temp_id(now);
    let b = generate_temp_id(now);
    assert_ne!(a, b);
}

#[test]
fn generated_ids_are_recognised() {
    assert!(is_temp_id(&generate_temp_id(Utc::now())));
}

#[parameterized(
    server_uuid = { "7f1c2a9e-3b1d-4c55-9a0e-1b2c3d4e5f60", false },
    server_number = { "1024", false },
    prefix_only = { "temp_", false },
    missing_suffix = { "temp_1700000000000_", false },
    non_numeric_time = { "temp_abc_x1y2", false },
    uppercase_suffix = { "temp_1700000000000_ABC", false },
    well_formed = { "temp_1700000000000_k3j9x0a1b", true },
)]
fn temp_id_detection(id: &str, expected: bool) {
    assert_eq!(is_temp_id(id), expected);
}
