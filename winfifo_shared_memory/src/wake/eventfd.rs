//! Eventfd wake handle

use super::WakeHandle;
use crate::error::{FifoError, FifoResult};
use nix::errno::Errno;
use nix::sys::eventfd::{EfdFlags, EventFd};
use std::sync::atomic::{AtomicU32, Ordering, fence};
use tracing::error;
use winfifo_common::config::WakeBackend;

/// Counting eventfd, one per sleeper role
///
/// A signal written while nobody reads stays in the eventfd counter, so the
/// next read returns at once instead of losing the wakeup. The sleeper then
/// re-checks the word and arms again if nothing changed.
pub struct EventFdWake {
    fd: EventFd,
}

impl EventFdWake {
    /// Create a blocking eventfd with a zero counter
    pub fn new() -> FifoResult<Self> {
        let fd = EventFd::from_value_and_flags(0, EfdFlags::EFD_CLOEXEC).map_err(|source| {
            FifoError::WakeHandle {
                backend: WakeBackend::EventFd,
                source,
            }
        })?;
        Ok(Self { fd })
    }
}

impl WakeHandle for EventFdWake {
    fn arm_and_block(&self, word: &AtomicU32, expected: u32) {
        fence(Ordering::SeqCst);
        if word.load(Ordering::Acquire) != expected {
            return;
        }
        match self.fd.read() {
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => {
                error!("eventfd read failed: {e}");
                panic!("eventfd read failed: {e}");
            }
        }
    }

    fn signal(&self, _word: &AtomicU32) {
        fence(Ordering::SeqCst);
        if let Err(e) = self.fd.write(1) {
            error!("eventfd write failed: {e}");
            panic!("eventfd write failed: {e}");
        }
    }

    fn backend(&self) -> WakeBackend {
        WakeBackend::EventFd
    }
}
