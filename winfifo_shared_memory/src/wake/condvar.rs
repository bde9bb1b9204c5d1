//! Condition variable wake handle

use super::WakeHandle;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use winfifo_common::config::WakeBackend;

/// Mutex + condvar pair for platforms or tests without kernel primitives
///
/// The sleeper checks the word while holding the mutex and the signaller
/// takes the same mutex before notifying, so a publish cannot slip between
/// the check and the wait.
#[derive(Debug, Default)]
pub struct CondvarWake {
    lock: Mutex<()>,
    cond: Condvar,
}

impl CondvarWake {
    /// New idle handle
    pub fn new() -> Self {
        Self::default()
    }
}

impl WakeHandle for CondvarWake {
    fn arm_and_block(&self, word: &AtomicU32, expected: u32) {
        let mut guard = self.lock.lock();
        while word.load(Ordering::SeqCst) == expected {
            self.cond.wait(&mut guard);
        }
    }

    fn signal(&self, _word: &AtomicU32) {
        let _guard = self.lock.lock();
        self.cond.notify_one();
    }

    fn backend(&self) -> WakeBackend {
        WakeBackend::Condvar
    }
}
