//! The snapshot-lifecycle commit mutex (spec.md §4.3, §5): `PrepareSnapshots`
//! acquires it, `CommitSnapshots`/`RollbackSnapshots` release it, so it stays
//! held across that whole three-call sequence rather than just one method
//! body. A plain `parking_lot::Mutex` can't express a guard held across
//! separate public calls without unsafe lifetime extension, so this models
//! the same "only one snapshot-prepare in flight" invariant as an explicit
//! held-flag guarded by a condvar, the same pattern the WAL writer's fsync
//! scheduler uses for its armed/pending state.

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
pub struct CommitGate {
    held: Mutex<bool>,
    cv: Condvar,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other snapshot-prepare is in flight, then mark the
    /// gate held.
    pub fn acquire(&self) {
        let mut held = self.held.lock();
        while *held {
            self.cv.wait(&mut held);
        }
        *held = true;
    }

    /// Release the gate, waking one waiter if any are blocked in `acquire`.
    pub fn release(&self) {
        let mut held = self.held.lock();
        *held = false;
        self.cv.notify_one();
    }
}
