// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn explicit_root_wins() {
    let paths = DataPaths::resolve(Some(PathBuf::from("/tmp/msq-test"))).unwrap();
    assert_eq!(paths.root(), Path::new("/tmp/msq-test"));
}

#[test]
fn files_live_under_root() {
    let paths = DataPaths::new("/data/msq");
    assert_eq!(paths.dead_letters(), Path::new("/data/msq/dlq.jsonl"));
    assert_eq!(paths.circuit_breaker(), Path::new("/data/msq/circuit_breaker.json"));
    assert_eq!(paths.recovery_state(), Path::new("/data/msq/recovery_state.json"));
    assert_eq!(paths.outage_history(), Path::new("/data/msq/outage_history.json"));
    assert_eq!(paths.daemon_lock(), Path::new("/data/msq/msqd.lock"));
    assert_eq!(paths.queue_dir(), Path::new("/data/msq"));
}
