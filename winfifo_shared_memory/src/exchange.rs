//! Exchange protocol
//!
//! An exchange publishes what the window ate since the previous exchange and
//! refreshes how much the window may use next:
//!
//! 1. `freed = start - published` (wrapping); more than `capacity` means the
//!    window is corrupt.
//! 2. Publish `published + freed` with a release store and resync `start`.
//! 3. If the cached length fell below `pull_batch`, recompute it from the
//!    opposite counter; otherwise keep the cached remainder.
//! 4. If the opposite side sleeps on the pre-publish value, wake it.
//! 5. If fewer than `min_batch` bytes are usable, wait and start over.

use crate::window::{Role, Window};
use std::sync::atomic::Ordering;
use tracing::error;

impl Window<'_> {
    /// Publish local progress and refresh the window for its role
    ///
    /// Blocks while fewer than `min_batch` bytes are usable.
    pub fn exchange(&mut self) {
        match self.role {
            Role::Reader => self.exchange_as_reader(),
            Role::Writer => self.exchange_as_writer(),
        }
    }

    /// Release consumed bytes and learn how many more are published
    ///
    /// # Panics
    ///
    /// Panics on a writer window, or if the window counters are corrupt.
    pub fn exchange_as_reader(&mut self) {
        self.expect_role(Role::Reader, "exchange_as_reader");
        let channel = self.channel;
        let header = channel.header();
        let capacity = channel.capacity();

        loop {
            // Only this side stores `tail`.
            let old_tail = header.consumer.tail.load(Ordering::Relaxed);
            let freed = self.start.wrapping_sub(old_tail);
            if freed > capacity {
                self.invalid_window("freed", freed);
            }

            let tail = old_tail.wrapping_add(freed);
            if freed != 0 {
                header.consumer.tail.store(tail, Ordering::Release);
            }
            self.start = tail;

            if self.len < self.pull_batch {
                let head = header.producer.head.load(Ordering::Acquire);
                self.len = head.wrapping_sub(tail);
            }
            if self.len > capacity {
                self.invalid_window("len", self.len);
            }

            channel.counters().record_exchange(Role::Reader);
            if freed != 0 {
                channel.notify_writer(old_tail);
            }

            if self.len >= self.min_batch {
                return;
            }
            self.wait_as_reader();
        }
    }

    /// Publish produced bytes and learn how much space is free
    ///
    /// # Panics
    ///
    /// Panics on a reader window, or if the window counters are corrupt.
    pub fn exchange_as_writer(&mut self) {
        self.expect_role(Role::Writer, "exchange_as_writer");
        let channel = self.channel;
        let header = channel.header();
        let capacity = channel.capacity();

        loop {
            // Only this side stores `head`.
            let old_head = header.producer.head.load(Ordering::Relaxed);
            let produced = self.start.wrapping_sub(old_head);
            if produced > capacity {
                self.invalid_window("produced", produced);
            }

            let head = old_head.wrapping_add(produced);
            if produced != 0 {
                header.producer.head.store(head, Ordering::Release);
            }
            self.start = head;

            if self.len < self.pull_batch {
                let tail = header.consumer.tail.load(Ordering::Acquire);
                self.len = tail.wrapping_add(capacity).wrapping_sub(head);
            }
            if self.len > capacity {
                self.invalid_window("len", self.len);
            }

            channel.counters().record_exchange(Role::Writer);
            if produced != 0 {
                channel.notify_reader(old_head);
            }

            if self.len >= self.min_batch {
                return;
            }
            self.wait_as_writer();
        }
    }

    /// Report a corrupt window and stop
    ///
    /// Release builds abort on panic.
    #[cold]
    #[inline(never)]
    fn invalid_window(&self, field: &str, value: u32) -> ! {
        let capacity = self.channel.capacity();
        error!(
            window = ?(self as *const Self),
            role = %self.role,
            start = self.start,
            len = self.len,
            head = self.channel.head(),
            tail = self.channel.tail(),
            capacity,
            "window invariant violated: {field} = {value} exceeds capacity"
        );
        panic!(
            "window {:p} ({} role) is invalid: {field} = {value} exceeds capacity {capacity}",
            self as *const Self, self.role
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::Channel;
    use crate::window::Window;
    use winfifo_common::config::WindowConfig;

    #[test]
    fn test_exchange_publishes_exactly_what_was_eaten() {
        let channel = Channel::create(4096).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        let mut reader = Window::reader(&channel, WindowConfig::default()).unwrap();

        writer.exchange();
        assert_eq!(writer.len(), 4096);
        writer.eat_span(10);
        writer.eat_span(20);
        assert_eq!(channel.head(), 0);
        writer.exchange();
        assert_eq!(channel.head(), 30);
        assert_eq!(writer.start(), 30);
        assert_eq!(writer.len(), 4066);

        reader.exchange();
        assert_eq!(reader.len(), 30);
        reader.eat_span(12);
        reader.exchange();
        assert_eq!(channel.tail(), 12);
        assert_eq!(reader.start(), 12);
        assert_eq!(reader.len(), 18);
        assert!(channel.used() <= channel.capacity());
    }

    #[test]
    fn test_cached_length_kept_above_pull_batch() {
        let channel = Channel::create(4096).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        let mut reader = Window::reader(
            &channel,
            WindowConfig {
                min_batch: 0,
                pull_batch: 16,
            },
        )
        .unwrap();

        writer.exchange();
        writer.eat_span(100);
        writer.exchange();

        reader.exchange();
        assert_eq!(reader.len(), 100);

        // More data arrives, but the reader still caches 60 >= 16 bytes.
        writer.eat_span(100);
        writer.exchange();
        reader.eat_span(40);
        reader.exchange();
        assert_eq!(reader.len(), 60);

        // Below the threshold the reader pulls everything available.
        reader.eat_span(50);
        reader.exchange();
        assert_eq!(reader.len(), 110);
        assert_eq!(channel.used(), 110);
    }

    #[test]
    fn test_writer_sees_space_freed_by_reader() {
        let channel = Channel::create(64).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        let mut reader = Window::reader(&channel, WindowConfig::default()).unwrap();

        writer.exchange();
        writer.eat_span(64);
        writer.exchange();
        assert_eq!(writer.len(), 0);
        assert_eq!(channel.used(), 64);

        reader.exchange();
        reader.eat_span(24);
        reader.exchange();

        writer.exchange();
        assert_eq!(writer.len(), 24);
        assert_eq!(writer.peek_span().offset, 0);
    }

    #[test]
    fn test_idle_exchange_counts_but_does_not_wake() {
        let channel = Channel::create(4096).unwrap();
        let mut reader = Window::reader(&channel, WindowConfig::default()).unwrap();
        reader.exchange();
        reader.exchange();
        let stats = channel.stats();
        assert_eq!(stats.reader_exchanges, 2);
        assert_eq!(stats.total_wakes(), 0);
    }

    #[test]
    #[should_panic(expected = "is invalid: produced")]
    fn test_corrupt_window_is_fatal() {
        let channel = Channel::create(4096).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        writer.start = 5000;
        writer.exchange();
    }

    #[test]
    #[should_panic(expected = "requires a reader window")]
    fn test_role_misuse_is_fatal() {
        let channel = Channel::create(4096).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        writer.exchange_as_reader();
    }
}
