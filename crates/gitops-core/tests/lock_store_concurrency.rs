//! Concurrent pipeline instances sharing one locked-branches file
//!
//! Each thread plays a separate instance with its own `FileLockRegion`, so
//! the only coordination between them is the OS file lock.

use gitops_client::LocalFileStore;
use gitops_core::{BranchLockStore, FileLockRegion};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const REGION: &str = "merge-request-locked-branches";
const INSTANCES: usize = 8;
const ROUNDS: usize = 10;

fn instance(dir: &Path) -> BranchLockStore<FileLockRegion, LocalFileStore> {
    BranchLockStore::new(
        FileLockRegion::new(dir.join("regions"), Duration::from_secs(30)),
        LocalFileStore,
        dir.join("locked-branches"),
        REGION,
    )
}

#[test]
fn concurrent_locks_are_never_lost() {
    let dir = tempfile::tempdir().unwrap();
    let barrier = Arc::new(Barrier::new(INSTANCES));

    let handles: Vec<_> = (0..INSTANCES)
        .map(|i| {
            let dir = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = instance(&dir);
                barrier.wait();
                for round in 0..ROUNDS {
                    store.lock(&[format!("mr-{}-{}", i, round)]).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let locked = instance(dir.path()).locked().unwrap();
    assert_eq!(locked.len(), INSTANCES * ROUNDS);
    for i in 0..INSTANCES {
        for round in 0..ROUNDS {
            assert!(locked.contains(&format!("mr-{}-{}", i, round)));
        }
    }
}

#[test]
fn concurrent_lock_and_unlock_match_a_serial_order() {
    let dir = tempfile::tempdir().unwrap();
    let seed = instance(dir.path());
    // Every instance removes its own "old" branch and adds its own "new" one
    let olds: Vec<String> = (0..INSTANCES).map(|i| format!("old-{}", i)).collect();
    seed.lock(olds.as_slice()).unwrap();
    seed.lock(&["shared"]).unwrap();

    let barrier = Arc::new(Barrier::new(INSTANCES));
    let handles: Vec<_> = (0..INSTANCES)
        .map(|i| {
            let dir = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = instance(&dir);
                barrier.wait();
                store.unlock(&[format!("old-{}", i)]).unwrap();
                store.lock(&[format!("new-{}", i)]).unwrap();
                // Idempotent on the shared entry, whatever the interleaving
                store.lock(&["shared"]).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let store = instance(dir.path());
    let locked = store.locked().unwrap();
    assert_eq!(locked.len(), INSTANCES + 1);
    for i in 0..INSTANCES {
        assert!(store.is_allowed(&format!("old-{}", i)).unwrap());
        assert!(!store.is_allowed(&format!("new-{}", i)).unwrap());
    }
    assert!(!store.is_allowed("shared").unwrap());
}
