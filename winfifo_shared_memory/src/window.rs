//! Per-side windows and span accessors
//!
//! A window is the private cursor one side keeps over the part of the ring it
//! currently owns: published data for the reader, free space for the writer.
//! Advancing it with [`Window::eat_span`] is purely local; the other side only
//! learns about it on the next [`Window::exchange`].

use crate::channel::Channel;
use crate::error::{FifoError, FifoResult};
use std::fmt;
use std::sync::atomic::Ordering;
use tracing::debug;
use winfifo_common::config::WindowConfig;

/// Side of the channel a window acts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Consumer: owns published bytes, advances `tail`
    Reader,
    /// Producer: owns free space, advances `head`
    Writer,
}

impl Role {
    /// Lowercase role name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
        }
    }

    pub(crate) const fn bit(&self) -> u32 {
        match self {
            Self::Reader => 1,
            Self::Writer => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contiguous byte range inside the data region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Physical offset into the data region
    pub offset: usize,
    /// Length in bytes; never crosses the end of the region
    pub len: usize,
}

impl Span {
    /// True when the span holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte range within the data region
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Side-private cursor over the channel
///
/// After each exchange `start` equals the published counter of the window's
/// role (`tail` for a reader, `head` for a writer) and `len` is the number of
/// bytes usable from there.
pub struct Window<'c> {
    pub(crate) channel: &'c Channel,
    pub(crate) role: Role,
    pub(crate) start: u32,
    pub(crate) len: u32,
    pub(crate) min_batch: u32,
    pub(crate) pull_batch: u32,
}

impl<'c> Window<'c> {
    /// Attach a window of `role` to `channel`
    ///
    /// Only one window per role may be attached at a time. `pull_batch` is
    /// raised to `min_batch` if it is smaller.
    pub fn new(channel: &'c Channel, role: Role, config: WindowConfig) -> FifoResult<Self> {
        config
            .validate(channel.capacity() as usize)
            .map_err(|e| FifoError::InvalidWindow {
                reason: e.to_string(),
            })?;
        let config = config.normalized();

        channel.claim(role)?;

        let header = channel.header();
        let start = match role {
            Role::Reader => header.consumer.tail.load(Ordering::Acquire),
            Role::Writer => header.producer.head.load(Ordering::Acquire),
        };

        debug!(
            %role,
            start,
            min_batch = config.min_batch,
            pull_batch = config.pull_batch,
            "window attached"
        );

        Ok(Self {
            channel,
            role,
            start,
            len: 0,
            min_batch: config.min_batch,
            pull_batch: config.pull_batch,
        })
    }

    /// Attach the consumer window
    pub fn reader(channel: &'c Channel, config: WindowConfig) -> FifoResult<Self> {
        Self::new(channel, Role::Reader, config)
    }

    /// Attach the producer window
    pub fn writer(channel: &'c Channel, config: WindowConfig) -> FifoResult<Self> {
        Self::new(channel, Role::Writer, config)
    }

    /// Role of this window
    pub fn role(&self) -> Role {
        self.role
    }

    /// Local cursor in counter space
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Bytes currently usable from `start`
    pub fn len(&self) -> u32 {
        self.len
    }

    /// True when no bytes are usable until the next exchange
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Blocking threshold
    pub fn min_batch(&self) -> u32 {
        self.min_batch
    }

    /// Refresh threshold
    pub fn pull_batch(&self) -> u32 {
        self.pull_batch
    }

    /// Channel this window is attached to
    pub fn channel(&self) -> &'c Channel {
        self.channel
    }

    /// Replace the batching policy; takes effect on the next exchange
    ///
    /// Dropping `min_batch` to zero before a final exchange publishes the
    /// last bytes without blocking on the other side.
    pub fn set_policy(&mut self, config: WindowConfig) -> FifoResult<()> {
        config
            .validate(self.channel.capacity() as usize)
            .map_err(|e| FifoError::InvalidWindow {
                reason: e.to_string(),
            })?;
        let config = config.normalized();
        self.min_batch = config.min_batch;
        self.pull_batch = config.pull_batch;
        Ok(())
    }

    /// Current batching policy
    pub fn policy(&self) -> WindowConfig {
        WindowConfig {
            min_batch: self.min_batch,
            pull_batch: self.pull_batch,
        }
    }

    /// Contiguous run at `start`, cut at the physical end of the ring
    #[inline]
    pub fn peek_span(&self) -> Span {
        let offset = self.channel.index(self.start);
        let until_wrap = self.channel.capacity() as usize - offset;
        Span {
            offset,
            len: (self.len as usize).min(until_wrap),
        }
    }

    /// Advance the cursor by `n` bytes without publishing
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the usable length.
    #[inline]
    pub fn eat_span(&mut self, n: usize) {
        assert!(
            n <= self.len as usize,
            "eat_span({n}) exceeds {} window length {}",
            self.role,
            self.len
        );
        let n = n as u32;
        self.start = self.start.wrapping_add(n);
        self.len -= n;
    }

    /// Peek the contiguous run and eat all of it
    #[inline]
    pub fn get_span(&mut self) -> Span {
        let span = self.peek_span();
        self.eat_span(span.len);
        span
    }

    /// Bytes of the peeked span (reader windows)
    ///
    /// # Panics
    ///
    /// Panics on a writer window: free space holds no data.
    pub fn peek_bytes(&self) -> &[u8] {
        self.expect_role(Role::Reader, "peek_bytes");
        // SAFETY: the span lies in [tail, head), which the writer does not
        // touch until this window publishes it.
        unsafe { self.channel.bytes(self.peek_span()) }
    }

    /// Writable bytes of the peeked span (writer windows)
    ///
    /// # Panics
    ///
    /// Panics on a reader window.
    pub fn peek_bytes_mut(&mut self) -> &mut [u8] {
        self.expect_role(Role::Writer, "peek_bytes_mut");
        // SAFETY: the span lies in [head, tail + capacity), which the reader
        // does not touch until this window publishes it; `&mut self` keeps
        // the view unique.
        unsafe { self.channel.bytes_mut(self.peek_span()) }
    }

    /// Copy usable bytes into `buf`, eating what was copied
    ///
    /// Crosses the wrap point if needed. Does not exchange; returns the
    /// number of bytes copied.
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < buf.len() && self.len > 0 {
            let src = self.peek_bytes();
            let n = src.len().min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&src[..n]);
            self.eat_span(n);
            copied += n;
        }
        copied
    }

    /// Copy `buf` into free space, eating what was copied
    ///
    /// Crosses the wrap point if needed. Does not exchange; returns the
    /// number of bytes copied.
    pub fn write_from(&mut self, buf: &[u8]) -> usize {
        let mut copied = 0;
        while copied < buf.len() && self.len > 0 {
            let dst = self.peek_bytes_mut();
            let n = dst.len().min(buf.len() - copied);
            dst[..n].copy_from_slice(&buf[copied..copied + n]);
            self.eat_span(n);
            copied += n;
        }
        copied
    }

    /// Panic unless this window acts for `role`
    #[track_caller]
    pub(crate) fn expect_role(&self, role: Role, operation: &str) {
        if self.role != role {
            panic!(
                "{operation} called on a {} window; it requires a {role} window",
                self.role
            );
        }
    }
}

impl fmt::Debug for Window<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("role", &self.role)
            .field("start", &self.start)
            .field("len", &self.len)
            .field("min_batch", &self.min_batch)
            .field("pull_batch", &self.pull_batch)
            .finish()
    }
}

impl Drop for Window<'_> {
    fn drop(&mut self) {
        self.channel.release(self.role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winfifo_common::config::ChannelConfig;

    #[test]
    fn test_window_init() {
        let channel = Channel::create(4096).unwrap();
        let reader = Window::reader(&channel, WindowConfig::default()).unwrap();
        let writer = Window::writer(&channel, WindowConfig::default()).unwrap();

        assert_eq!(reader.role(), Role::Reader);
        assert_eq!(writer.role(), Role::Writer);
        assert_eq!(reader.start(), channel.tail());
        assert_eq!(writer.start(), channel.head());
        assert_eq!(reader.len(), 0);
        assert!(writer.is_empty());
    }

    #[test]
    fn test_pull_batch_raised_to_min_batch() {
        let channel = Channel::create(4096).unwrap();
        let window = Window::reader(
            &channel,
            WindowConfig {
                min_batch: 64,
                pull_batch: 8,
            },
        )
        .unwrap();
        assert_eq!(window.min_batch(), 64);
        assert_eq!(window.pull_batch(), 64);
    }

    #[test]
    fn test_unreachable_min_batch_rejected() {
        let channel = Channel::create(4096).unwrap();
        let result = Window::writer(&channel, WindowConfig::blocking(4097));
        assert!(matches!(result, Err(FifoError::InvalidWindow { .. })));
    }

    #[test]
    fn test_policy_can_change_between_exchanges() {
        let channel = Channel::create(4096).unwrap();
        let mut reader = Window::reader(&channel, WindowConfig::blocking(16)).unwrap();
        assert!(reader.set_policy(WindowConfig::blocking(8192)).is_err());
        assert_eq!(reader.policy().min_batch, 16);

        reader.set_policy(WindowConfig::default()).unwrap();
        assert_eq!(reader.policy(), WindowConfig::default());
        // Would block under the old policy.
        reader.exchange();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn test_second_window_of_a_role_rejected() {
        let channel = Channel::create(4096).unwrap();
        let first = Window::reader(&channel, WindowConfig::default()).unwrap();
        assert!(matches!(
            Window::reader(&channel, WindowConfig::default()),
            Err(FifoError::RoleInUse { .. })
        ));
        drop(first);
        assert!(Window::reader(&channel, WindowConfig::default()).is_ok());
    }

    #[test]
    fn test_window_starts_at_published_counter() {
        let config = ChannelConfig::with_capacity(4096);
        let channel = Channel::with_start_position(&config, 1_000_000).unwrap();
        let writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        assert_eq!(writer.start(), 1_000_000);
        assert_eq!(writer.peek_span().offset, 1_000_000 % 4096);
    }

    #[test]
    fn test_peek_span_stops_at_wrap() {
        let channel = Channel::create(4096).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        writer.start = 4000;
        writer.len = 500;

        let span = writer.peek_span();
        assert_eq!(span, Span { offset: 4000, len: 96 });
        assert_eq!(writer.peek_span(), span);

        assert_eq!(writer.get_span(), span);
        let rest = writer.get_span();
        assert_eq!(rest, Span { offset: 0, len: 404 });
        assert!(writer.get_span().is_empty());
        assert_eq!(writer.start(), 4500);
    }

    #[test]
    fn test_eat_span_is_local() {
        let channel = Channel::create(4096).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        writer.exchange();
        writer.eat_span(100);
        assert_eq!(writer.start(), 100);
        assert_eq!(writer.len(), 3996);
        assert_eq!(channel.head(), 0);
    }

    #[test]
    #[should_panic(expected = "exceeds writer window length")]
    fn test_eat_past_len_panics() {
        let channel = Channel::create(4096).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        writer.eat_span(1);
    }

    #[test]
    #[should_panic(expected = "requires a writer window")]
    fn test_reader_cannot_take_mutable_view() {
        let channel = Channel::create(4096).unwrap();
        let mut reader = Window::reader(&channel, WindowConfig::default()).unwrap();
        let _ = reader.peek_bytes_mut();
    }

    #[test]
    fn test_copy_helpers_cross_the_wrap() {
        let channel = Channel::create(64).unwrap();
        let mut writer = Window::writer(&channel, WindowConfig::default()).unwrap();
        let mut reader = Window::reader(&channel, WindowConfig::default()).unwrap();

        // Move both cursors close to the physical end.
        writer.exchange();
        assert_eq!(writer.write_from(&[0u8; 60]), 60);
        writer.exchange();
        reader.exchange();
        let mut sink = [0u8; 60];
        assert_eq!(reader.read_into(&mut sink), 60);
        reader.exchange();

        writer.exchange();
        let payload: Vec<u8> = (0..40).collect();
        assert_eq!(writer.write_from(&payload), 40);
        writer.exchange();

        reader.exchange();
        assert_eq!(reader.peek_span().len, 4);
        let mut out = [0u8; 40];
        assert_eq!(reader.read_into(&mut out), 40);
        assert_eq!(&out[..], &payload[..]);
    }
}
