//! Wait protocol
//!
//! A side waits only when its last exchange left fewer than `min_batch`
//! usable bytes. It spins for a while on the opposite counter, then records
//! the counter value it saw in its wait marker and blocks on the wake handle
//! until the counter moves. The opposite side compares the marker with its
//! pre-publish counter after every publishing exchange and signals on a match.

use crate::window::{Role, Window};
use std::hint;
use std::sync::atomic::{AtomicU32, Ordering, fence};
use tracing::trace;
use winfifo_common::shm::consts::WAIT_UNSET;

impl Window<'_> {
    /// Block until the opposite side moves its counter
    ///
    /// Returns immediately if it already moved since the last exchange. The
    /// window itself is not refreshed; call [`Window::exchange`] afterwards.
    pub fn wait(&mut self) {
        match self.role {
            Role::Reader => self.wait_as_reader(),
            Role::Writer => self.wait_as_writer(),
        }
    }

    /// Block until the writer publishes past what this window has seen
    ///
    /// # Panics
    ///
    /// Panics on a writer window.
    pub fn wait_as_reader(&mut self) {
        self.expect_role(Role::Reader, "wait_as_reader");
        let channel = self.channel;
        let header = channel.header();

        let head = header.producer.head.load(Ordering::Acquire);
        if head.wrapping_sub(self.start) != self.len {
            return;
        }
        if spin_until_moved(&header.producer.head, head, channel.spin_count()) {
            return;
        }

        header.consumer.head_wait.store(u64::from(head), Ordering::SeqCst);
        fence(Ordering::SeqCst);
        channel.counters().record_sleep(Role::Reader);
        trace!(head, start = self.start, "reader sleeping");

        let wake = channel.head_wake();
        while header.producer.head.load(Ordering::SeqCst) == head {
            wake.arm_and_block(&header.producer.head, head);
        }
        header.consumer.head_wait.store(WAIT_UNSET, Ordering::Relaxed);
        trace!("reader woke");
    }

    /// Block until the reader releases space past what this window has seen
    ///
    /// # Panics
    ///
    /// Panics on a reader window.
    pub fn wait_as_writer(&mut self) {
        self.expect_role(Role::Writer, "wait_as_writer");
        let channel = self.channel;
        let header = channel.header();

        let tail = header.consumer.tail.load(Ordering::Acquire);
        let free = tail
            .wrapping_add(channel.capacity())
            .wrapping_sub(self.start);
        if free != self.len {
            return;
        }
        if spin_until_moved(&header.consumer.tail, tail, channel.spin_count()) {
            return;
        }

        header.producer.tail_wait.store(u64::from(tail), Ordering::SeqCst);
        fence(Ordering::SeqCst);
        channel.counters().record_sleep(Role::Writer);
        trace!(tail, start = self.start, "writer sleeping");

        let wake = channel.tail_wake();
        while header.consumer.tail.load(Ordering::SeqCst) == tail {
            wake.arm_and_block(&header.consumer.tail, tail);
        }
        header.producer.tail_wait.store(WAIT_UNSET, Ordering::Relaxed);
        trace!("writer woke");
    }
}

/// True if `word` left `seen` within `spins` polls
#[inline]
fn spin_until_moved(word: &AtomicU32, seen: u32, spins: u32) -> bool {
    for _ in 0..spins {
        hint::spin_loop();
        if word.load(Ordering::Acquire) != seen {
            return true;
        }
    }
    false
}
