// Common test utilities for integration tests
//
// This module provides shared fixtures for use across all integration
// tests.

#![allow(dead_code)]

use kestrel::{Collectable, Object, ObjectRef, Storage};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Test object counting how often its destroy hook ran.
pub struct Probe {
    pub name: &'static str,
    pub destroyed: Arc<AtomicUsize>,
}

impl Object for Probe {
    fn repr(&self) -> &'static str {
        self.name
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Collectable for Probe {}

/// Creates a probe object and the counter its destroy hook bumps.
pub fn create_probe(name: &'static str, storage: Storage) -> (ObjectRef<Probe>, Arc<AtomicUsize>) {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let obj = ObjectRef::new(
        Probe {
            name,
            destroyed: Arc::clone(&destroyed),
        },
        storage,
    );
    (obj, destroyed)
}

/// Creates a shared probe object.
pub fn create_shared_probe(name: &'static str) -> (ObjectRef<Probe>, Arc<AtomicUsize>) {
    create_probe(name, Storage::Shared)
}

/// Number of times the destroy hook ran.
pub fn destroy_count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Polls `cond` until it holds, failing the test after five seconds.
pub fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}
