// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    bad_request = { 400, false, false },
    not_found = { 404, false, false },
    conflict = { 409, false, false },
    unprocessable = { 422, false, false },
    internal = { 500, true, false },
    unavailable = { 503, true, false },
)]
fn status_classification(status: u16, retryable: bool, network: bool) {
    let err = RemoteError::from_status(status, "boom");
    assert_eq!(err.is_retryable(), retryable);
    assert_eq!(err.is_network(), network);
}

#[test]
fn only_404_is_not_found() {
    assert!(RemoteError::from_status(404, "gone").is_not_found());
    assert!(!RemoteError::from_status(410, "gone").is_not_found());
    assert!(!RemoteError::from_status(500, "boom").is_not_found());
}

#[test]
fn network_errors_are_retryable() {
    let err = RemoteError::Network("connection refused".into());
    assert!(err.is_network());
    assert!(err.is_retryable());
}

#[test]
fn invalid_response_is_not_retryable() {
    let err = RemoteError::InvalidResponse("missing id".into());
    assert!(!err.is_retryable());
}
