//! A small lock-free counter used to build each layer's statistics surface
//! (spec.md §6). Grounded in the teacher's `TransactionManager`, which keeps
//! its version/id counters as bare `AtomicU64`s rather than behind a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically-incrementing counter, safe to read concurrently with
/// writers. Uses `Relaxed` ordering: these are statistics, not
/// synchronization primitives, so no happens-before relationship is needed
/// between a counter bump and anything else.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge: a value that can go up or down, read by stats collection.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, v: u64) {
        self.0.store(v, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn sub(&self, n: u64) {
        self.0.fetch_sub(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
