// SPDX-License-Identifier: MIT

use super::*;
use msq_core::test_support::{metadata_job, titled_job};
use std::io::Write as _;
use tempfile::tempdir;
use yare::parameterized;

fn store(dir: &Path) -> DeadLetterStore {
    DeadLetterStore::open(&dir.join("dlq.jsonl")).unwrap()
}

fn add_at(store: &mut DeadLetterStore, scene: &str, kind: ErrorKind, failed_at_ms: u64) -> u64 {
    let job = metadata_job(scene, failed_at_ms);
    store.add(&job, kind, "boom", "trace", 2, failed_at_ms).unwrap()
}

#[test]
fn add_assigns_monotonic_ids() {
    let dir = tempdir().unwrap();
    let mut dlq = store(dir.path());

    let a = add_at(&mut dlq, "scene-1", ErrorKind::DownstreamDown, 1_000);
    let b = add_at(&mut dlq, "scene-2", ErrorKind::DownstreamDown, 2_000);

    assert_eq!(a, 1);
    assert_eq!(b, 2);
    assert_eq!(dlq.len(), 2);
}

#[test]
fn records_survive_reopen_and_ids_continue() {
    let dir = tempdir().unwrap();

    {
        let mut dlq = store(dir.path());
        add_at(&mut dlq, "scene-1", ErrorKind::Auth, 1_000);
    }

    let mut dlq = store(dir.path());
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq.get(1).unwrap().scene_id.as_str(), "scene-1");

    let next = add_at(&mut dlq, "scene-2", ErrorKind::Auth, 2_000);
    assert_eq!(next, 2);
}

#[test]
fn record_preserves_full_job_for_recovery() {
    let dir = tempdir().unwrap();
    let mut dlq = store(dir.path());

    let job = titled_job("scene-9", "Night Shift", 5_000);
    dlq.add(&job, ErrorKind::DownstreamDown, "503", "trace", 0, 6_000).unwrap();

    let record = dlq.get(1).unwrap();
    assert_eq!(record.job, job);
    assert_eq!(record.job.payload["title"], "Night Shift");
}

#[test]
fn recent_is_newest_first_without_payload() {
    let dir = tempdir().unwrap();
    let mut dlq = store(dir.path());

    for n in 0..5 {
        add_at(&mut dlq, &format!("scene-{n}"), ErrorKind::Transient, n * 1_000);
    }

    let recent = dlq.recent(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].scene_id.as_str(), "scene-4");
    assert_eq!(recent[1].scene_id.as_str(), "scene-3");
}

#[test]
fn window_bounds_are_inclusive() {
    let dir = tempdir().unwrap();
    let mut dlq = store(dir.path());

    add_at(&mut dlq, "before", ErrorKind::DownstreamDown, 999);
    add_at(&mut dlq, "start", ErrorKind::DownstreamDown, 1_000);
    add_at(&mut dlq, "mid", ErrorKind::DownstreamDown, 1_500);
    add_at(&mut dlq, "end", ErrorKind::DownstreamDown, 2_000);
    add_at(&mut dlq, "after", ErrorKind::DownstreamDown, 2_001);

    let hits = dlq.entries_in_window(1_000, 2_000, None);
    let scenes: Vec<&str> = hits.iter().map(|r| r.scene_id.as_str()).collect();
    assert_eq!(scenes, vec!["start", "mid", "end"]);
    assert_eq!(dlq.count_in_window(1_000, 2_000), 3);
}

#[test]
fn window_filters_by_kind() {
    let dir = tempdir().unwrap();
    let mut dlq = store(dir.path());

    add_at(&mut dlq, "down", ErrorKind::DownstreamDown, 1_000);
    add_at(&mut dlq, "auth", ErrorKind::Auth, 1_000);

    let kinds: HashSet<ErrorKind> = [ErrorKind::DownstreamDown].into();
    let hits = dlq.entries_in_window(0, 2_000, Some(&kinds));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].scene_id.as_str(), "down");
}

#[test]
fn counts_by_kind_groups() {
    let dir = tempdir().unwrap();
    let mut dlq = store(dir.path());

    add_at(&mut dlq, "a", ErrorKind::DownstreamDown, 1_000);
    add_at(&mut dlq, "b", ErrorKind::DownstreamDown, 1_000);
    add_at(&mut dlq, "c", ErrorKind::PermanentData, 1_000);

    let counts = dlq.counts_by_kind();
    assert_eq!(counts[&ErrorKind::DownstreamDown], 2);
    assert_eq!(counts[&ErrorKind::PermanentData], 1);
}

#[test]
fn retention_prunes_and_rewrites() {
    let dir = tempdir().unwrap();
    let day_ms = 86_400_000u64;
    let now_ms = 40 * day_ms;

    let mut dlq = store(dir.path());
    add_at(&mut dlq, "old", ErrorKind::Transient, 5 * day_ms);
    add_at(&mut dlq, "fresh", ErrorKind::Transient, 35 * day_ms);

    let pruned = dlq.prune_older_than_days(30, now_ms).unwrap();
    assert_eq!(pruned, 1);
    assert_eq!(dlq.len(), 1);

    // Appends still work after the rewrite, and the file reloads cleanly.
    add_at(&mut dlq, "later", ErrorKind::Transient, now_ms);
    drop(dlq);
    let dlq = store(dir.path());
    assert_eq!(dlq.len(), 2);
    assert!(dlq.get(1).is_none(), "pruned record is gone");
}

#[parameterized(
    epoch_ms = { "1700000000000", 1_700_000_000_000 },
    epoch_seconds_int = { "1700000000", 1_700_000_000_000 },
    epoch_seconds_float = { "1700000000.5", 1_700_000_000_500 },
    rfc3339 = { "\"2023-11-14T22:13:20Z\"", 1_700_000_000_000 },
    legacy_text = { "\"2023-11-14 22:13:20\"", 1_700_000_000_000 },
)]
fn failed_at_accepts_legacy_formats(raw: &str, expected_ms: u64) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dlq.jsonl");

    let job = serde_json::to_string(&metadata_job("scene-1", 0)).unwrap();
    let line = format!(
        "{{\"id\":1,\"scene_id\":\"scene-1\",\"kind\":\"downstream-down\",\"message\":\"m\",\"trace\":\"t\",\"retry_count\":0,\"failed_at_ms\":{raw},\"job\":{job}}}\n"
    );
    std::fs::write(&path, line).unwrap();

    let dlq = DeadLetterStore::open(&path).unwrap();
    assert_eq!(dlq.get(1).unwrap().failed_at_ms, expected_ms);
}

#[test]
fn torn_tail_is_dropped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dlq.jsonl");

    {
        let mut dlq = DeadLetterStore::open(&path).unwrap();
        add_at(&mut dlq, "scene-1", ErrorKind::Auth, 1_000);
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"id\":2,\"scene").unwrap();
    }

    let dlq = DeadLetterStore::open(&path).unwrap();
    assert_eq!(dlq.len(), 1);
}

#[test]
fn corrupt_interior_line_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dlq.jsonl");
    std::fs::write(&path, "garbage\n").unwrap();
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"more garbage\n").unwrap();
    }

    let err = DeadLetterStore::open(&path).unwrap_err();
    assert!(matches!(err, DlqError::Corrupt { line: 1, .. }));
}
