// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Temporary identifiers for records created while offline.
//!
//! Format: `temp_<unix-millis>_<random>` where the random part is 9 chars of
//! lowercase base-36. Server-issued ids never carry the `temp_` prefix.

use chrono::{DateTime, Utc};
use rand::Rng;

pub const TEMP_ID_PREFIX: &str = "temp_";

const RANDOM_LEN: usize = 9;
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a new temporary id stamped with `now`.
pub fn generate_temp_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RANDOM_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}{}_{}", TEMP_ID_PREFIX, now.timestamp_millis(), suffix)
}

/// Whether `id` was issued locally and is still awaiting a server id.
pub fn is_temp_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix(TEMP_ID_PREFIX) else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('_') else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && !suffix.is_empty()
        && suffix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
