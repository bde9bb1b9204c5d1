//! Futex wake handle

use super::WakeHandle;
use crate::platform::{futex_wait, futex_wake};
use std::sync::atomic::AtomicU32;
use tracing::error;
use winfifo_common::config::WakeBackend;

/// Blocks on the counter word itself with `FUTEX_WAIT`
///
/// The kernel compares the word against the expected value and queues the
/// sleeper atomically with respect to `FUTEX_WAKE`, so "store marker, then
/// block" cannot miss a publish.
#[derive(Debug, Clone, Copy)]
pub struct FutexWake {
    shared: bool,
}

impl FutexWake {
    /// Private futex for in-process channels, shared for mapped segments
    pub fn new(shared: bool) -> Self {
        Self { shared }
    }
}

impl WakeHandle for FutexWake {
    fn arm_and_block(&self, word: &AtomicU32, expected: u32) {
        if let Err(e) = futex_wait(word, expected, self.shared) {
            error!("futex_wait failed: {e}");
            panic!("futex_wait failed: {e}");
        }
    }

    fn signal(&self, word: &AtomicU32) {
        if let Err(e) = futex_wake(word, 1, self.shared) {
            error!("futex_wake failed: {e}");
            panic!("futex_wake failed: {e}");
        }
    }

    fn backend(&self) -> WakeBackend {
        WakeBackend::Futex
    }
}
