// SPDX-License-Identifier: MIT

use super::*;
use tempfile::tempdir;

#[test]
fn acquires_and_releases_on_drop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("locks").join("sched.lock");

    let lock = FileLock::try_exclusive(&path).unwrap();
    assert!(lock.is_some());
    drop(lock);

    let again = FileLock::try_exclusive(&path).unwrap();
    assert!(again.is_some());
}

#[test]
fn lock_path_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sched.lock");

    let lock = FileLock::try_exclusive(&path).unwrap().unwrap();
    assert_eq!(lock.path(), path);
}
