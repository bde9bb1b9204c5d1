//! Wake handles: the blocking primitive behind the wait/wake protocol
//!
//! A sleeper arms a handle with the counter word it is waiting on and the
//! value it last saw; the opposite side signals after it has changed that
//! word. Every backend guarantees that a signal issued after the sleeper
//! committed to sleeping is not lost:
//!
//! - [`FutexWake`] compares and blocks in the kernel on the word itself.
//! - [`EventFdWake`] keeps undelivered signals in the eventfd counter.
//! - [`CondvarWake`] checks the word under the mutex the signaller takes.

mod condvar;
mod eventfd;
mod futex;

pub use condvar::CondvarWake;
pub use eventfd::EventFdWake;
pub use futex::FutexWake;

use crate::error::FifoResult;
use std::sync::atomic::AtomicU32;
use winfifo_common::config::WakeBackend;

/// Blocking notification capability used for one sleeper role
pub trait WakeHandle: Send + Sync {
    /// Block while `word` still holds `expected`
    ///
    /// May return spuriously; callers re-check the word and loop.
    fn arm_and_block(&self, word: &AtomicU32, expected: u32);

    /// Wake the side blocked on `word`, if any
    fn signal(&self, word: &AtomicU32);

    /// Backend implementing this handle
    fn backend(&self) -> WakeBackend;
}

/// Construct a wake handle for `backend`
///
/// `shared` selects a process-shared futex for channels mapped by several
/// processes.
pub fn new_wake_handle(backend: WakeBackend, shared: bool) -> FifoResult<Box<dyn WakeHandle>> {
    Ok(match backend {
        WakeBackend::Futex => Box::new(FutexWake::new(shared)),
        WakeBackend::EventFd => Box::new(EventFdWake::new()?),
        WakeBackend::Condvar => Box::new(CondvarWake::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::Duration;

    fn check_sleeper_is_released(backend: WakeBackend) {
        let handle: Arc<dyn WakeHandle> = Arc::from(new_wake_handle(backend, false).unwrap());
        let word = Arc::new(AtomicU32::new(0));

        let sleeper = {
            let handle = Arc::clone(&handle);
            let word = Arc::clone(&word);
            thread::spawn(move || {
                while word.load(Ordering::Acquire) == 0 {
                    handle.arm_and_block(&word, 0);
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        word.store(1, Ordering::Release);
        handle.signal(&word);
        sleeper.join().unwrap();
    }

    fn check_changed_word_does_not_block(backend: WakeBackend) {
        let handle = new_wake_handle(backend, false).unwrap();
        let word = AtomicU32::new(3);
        // A signal posted before arming must not be lost either.
        handle.signal(&word);
        handle.arm_and_block(&word, 3);
        handle.arm_and_block(&word, 2);
    }

    #[test]
    fn test_futex_handle() {
        check_sleeper_is_released(WakeBackend::Futex);
        let handle = new_wake_handle(WakeBackend::Futex, false).unwrap();
        handle.arm_and_block(&AtomicU32::new(1), 0);
        assert_eq!(handle.backend(), WakeBackend::Futex);
    }

    #[test]
    fn test_eventfd_handle() {
        check_sleeper_is_released(WakeBackend::EventFd);
        check_changed_word_does_not_block(WakeBackend::EventFd);
    }

    #[test]
    fn test_condvar_handle() {
        check_sleeper_is_released(WakeBackend::Condvar);
        let handle = new_wake_handle(WakeBackend::Condvar, false).unwrap();
        handle.arm_and_block(&AtomicU32::new(1), 0);
        assert_eq!(handle.backend(), WakeBackend::Condvar);
    }
}
