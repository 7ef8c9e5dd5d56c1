// SPDX-License-Identifier: MIT

use super::*;
use yare::parameterized;

#[parameterized(
    transient = { ErrorKind::Transient, true },
    down = { ErrorKind::DownstreamDown, true },
    rate_limited = { ErrorKind::RateLimited, false },
    not_found = { ErrorKind::NotFound, false },
    auth = { ErrorKind::Auth, false },
    permission = { ErrorKind::Permission, false },
    permanent_data = { ErrorKind::PermanentData, false },
    internal = { ErrorKind::Internal, false },
)]
fn breaker_counting(kind: ErrorKind, counts: bool) {
    assert_eq!(kind.counts_toward_breaker(), counts);
}

#[parameterized(
    auth = { ErrorKind::Auth },
    permission = { ErrorKind::Permission },
    permanent_data = { ErrorKind::PermanentData },
)]
fn permanent_kinds_are_recovery_denied(kind: ErrorKind) {
    assert!(kind.is_permanent());
    assert!(kind.is_recovery_denied());
}

#[test]
fn kind_serializes_kebab_case() {
    let json = serde_json::to_string(&ErrorKind::DownstreamDown).unwrap();
    assert_eq!(json, "\"downstream-down\"");
    let back: ErrorKind = serde_json::from_str("\"permanent-data\"").unwrap();
    assert_eq!(back, ErrorKind::PermanentData);
}

#[test]
fn display_matches_serde_tag() {
    assert_eq!(ErrorKind::DownstreamDown.to_string(), "downstream-down");
    assert_eq!(ErrorKind::RateLimited.to_string(), "rate-limited");
    assert_eq!(ErrorKind::PermanentData.as_str(), "permanent-data");
}

#[test]
fn error_exposes_kind_and_message() {
    let err = SyncError::DownstreamDown("connection refused".into());
    assert_eq!(err.kind(), ErrorKind::DownstreamDown);
    assert_eq!(err.message(), "connection refused");
    assert_eq!(err.to_string(), "downstream unavailable: connection refused");
}
