// SPDX-License-Identifier: MIT

use super::*;
use yare::parameterized;

const BASE: Duration = Duration::from_secs(5);
const CAP: Duration = Duration::from_secs(60);

#[parameterized(
    zero = { 0, 5 },
    one = { 1, 10 },
    two = { 2, 20 },
    three = { 3, 40 },
    capped = { 4, 60 },
    deep = { 10, 60 },
)]
fn ceiling_doubles_then_caps(retry: u32, expected_secs: u64) {
    assert_eq!(backoff_ceiling(retry, BASE, CAP), Duration::from_secs(expected_secs));
}

#[test]
fn jitter_stays_within_ceiling() {
    for retry in 0..6 {
        for seed in 0..50 {
            let delay = full_jitter(retry, BASE, CAP, Some(seed));
            assert!(delay <= backoff_ceiling(retry, BASE, CAP));
        }
    }
}

#[test]
fn seeded_draw_is_deterministic() {
    let a = full_jitter(3, BASE, CAP, Some(7));
    let b = full_jitter(3, BASE, CAP, Some(7));
    assert_eq!(a, b);
}

#[test]
fn different_seeds_vary() {
    let draws: Vec<Duration> = (0..20).map(|s| full_jitter(3, BASE, CAP, Some(s))).collect();
    let first = draws[0];
    assert!(draws.iter().any(|d| *d != first));
}

#[test]
fn zero_base_yields_zero_delay() {
    assert_eq!(full_jitter(5, Duration::ZERO, Duration::ZERO, Some(1)), Duration::ZERO);
}

#[test]
fn huge_retry_count_saturates_at_cap() {
    assert_eq!(backoff_ceiling(u32::MAX, BASE, CAP), CAP);
}
