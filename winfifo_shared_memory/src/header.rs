//! Channel header layout
//!
//! The header sits at the start of the mapped block, immediately followed by
//! the ring data. It is split into three cache lines:
//!
//! ```text
//! ┌──────────── meta (read-mostly) ────────────┐
//! │ magic | capacity | wake_backend | attached │
//! ├──────────── producer-written ──────────────┤
//! │ head  | tail_wait                          │
//! ├──────────── consumer-written ──────────────┤
//! │ tail  | head_wait                          │
//! └────────────────────────────────────────────┘
//! ```
//!
//! Each hot line has exactly one writing side: the producer publishes `head`
//! and records `tail_wait` before sleeping on `tail`; the consumer publishes
//! `tail` and records `head_wait` before sleeping on `head`. Wait markers are
//! 64-bit so `WAIT_UNSET` stays outside the 32-bit counter range.

use crate::error::{FifoError, FifoResult};
use static_assertions::{const_assert, const_assert_eq};
use std::mem::{offset_of, size_of};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use winfifo_common::config::WakeBackend;
use winfifo_common::shm::consts::{
    CACHE_LINE_SIZE, MAX_CAPACITY, MIN_CAPACITY, WAIT_UNSET, WINFIFO_MAGIC,
};

/// Read-mostly channel metadata
#[repr(C, align(64))]
pub struct MetaLine {
    /// Magic bytes, `WINFIFO_MAGIC` once initialized
    pub magic: [u8; 8],
    /// Ring capacity in bytes
    pub capacity: u32,
    /// `WakeBackend` tag
    pub wake_backend: u32,
    /// Bitmask of attached window roles
    pub attached: AtomicU32,
}

/// Fields written only by the producer
#[repr(C, align(64))]
pub struct ProducerLine {
    /// Total bytes ever published by the producer
    pub head: AtomicU32,
    /// `tail` value the sleeping producer waits on, `WAIT_UNSET` otherwise
    pub tail_wait: AtomicU64,
}

/// Fields written only by the consumer
#[repr(C, align(64))]
pub struct ConsumerLine {
    /// Total bytes ever released by the consumer
    pub tail: AtomicU32,
    /// `head` value the sleeping consumer waits on, `WAIT_UNSET` otherwise
    pub head_wait: AtomicU64,
}

/// Shared channel header
#[repr(C)]
pub struct ChannelHeader {
    /// Metadata line
    pub meta: MetaLine,
    /// Producer hot line
    pub producer: ProducerLine,
    /// Consumer hot line
    pub consumer: ConsumerLine,
}

/// Size of the header; the ring data starts at this offset.
pub const HEADER_SIZE: usize = size_of::<ChannelHeader>();

const_assert_eq!(HEADER_SIZE, 3 * CACHE_LINE_SIZE);
const_assert_eq!(core::mem::align_of::<ChannelHeader>(), CACHE_LINE_SIZE);
const_assert!(
    offset_of!(ChannelHeader, consumer) - offset_of!(ChannelHeader, producer) >= CACHE_LINE_SIZE
);
const_assert!(offset_of!(ChannelHeader, producer) - offset_of!(ChannelHeader, meta) >= CACHE_LINE_SIZE);

impl ChannelHeader {
    /// Fresh header with both counters at `position` and nobody waiting
    pub fn new(capacity: u32, backend: WakeBackend, position: u32) -> Self {
        Self {
            meta: MetaLine {
                magic: WINFIFO_MAGIC,
                capacity,
                wake_backend: backend as u32,
                attached: AtomicU32::new(0),
            },
            producer: ProducerLine {
                head: AtomicU32::new(position),
                tail_wait: AtomicU64::new(WAIT_UNSET),
            },
            consumer: ConsumerLine {
                tail: AtomicU32::new(position),
                head_wait: AtomicU64::new(WAIT_UNSET),
            },
        }
    }

    /// Validate magic, capacity and backend tag of a mapped header
    pub fn validate(&self, name: &str) -> FifoResult<WakeBackend> {
        let invalid = |reason: String| FifoError::InvalidHeader {
            name: name.to_string(),
            reason,
        };

        if self.meta.magic != WINFIFO_MAGIC {
            return Err(invalid("bad magic".to_string()));
        }

        let capacity = self.meta.capacity as usize;
        if !capacity.is_power_of_two() || !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(invalid(format!("capacity {capacity} out of range")));
        }

        let backend = WakeBackend::from_u32(self.meta.wake_backend)
            .ok_or_else(|| invalid(format!("unknown wake backend {}", self.meta.wake_backend)))?;

        let used = self.used();
        if used as usize > capacity {
            return Err(invalid(format!("head - tail = {used} exceeds capacity")));
        }

        Ok(backend)
    }

    /// Bytes currently published and not yet released
    pub fn used(&self) -> u32 {
        let tail = self.consumer.tail.load(Ordering::Acquire);
        let head = self.producer.head.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Set `bit` in the attached mask; returns false if it was already set
    pub fn try_attach(&self, bit: u32) -> bool {
        self.meta.attached.fetch_or(bit, Ordering::AcqRel) & bit == 0
    }

    /// Clear `bit` in the attached mask
    pub fn detach(&self, bit: u32) {
        self.meta.attached.fetch_and(!bit, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hot_lines_do_not_share_a_cache_line() {
        let producer = offset_of!(ChannelHeader, producer);
        let consumer = offset_of!(ChannelHeader, consumer);
        assert_eq!(producer % CACHE_LINE_SIZE, 0);
        assert_eq!(consumer % CACHE_LINE_SIZE, 0);
        assert!(consumer - producer >= CACHE_LINE_SIZE);
    }

    #[test]
    fn test_header_creation() {
        let header = ChannelHeader::new(4096, WakeBackend::Futex, 0);
        assert_eq!(header.meta.magic, WINFIFO_MAGIC);
        assert_eq!(header.meta.capacity, 4096);
        assert_eq!(header.producer.head.load(Ordering::Relaxed), 0);
        assert_eq!(header.consumer.tail.load(Ordering::Relaxed), 0);
        assert_eq!(header.producer.tail_wait.load(Ordering::Relaxed), WAIT_UNSET);
        assert_eq!(header.consumer.head_wait.load(Ordering::Relaxed), WAIT_UNSET);
    }

    #[test]
    fn test_header_validation() {
        let header = ChannelHeader::new(4096, WakeBackend::EventFd, 7);
        assert_eq!(header.validate("t").unwrap(), WakeBackend::EventFd);

        let mut bad = ChannelHeader::new(4096, WakeBackend::Futex, 0);
        bad.meta.magic = [0; 8];
        assert!(matches!(
            bad.validate("t"),
            Err(FifoError::InvalidHeader { .. })
        ));

        let bad = ChannelHeader::new(3000, WakeBackend::Futex, 0);
        assert!(bad.validate("t").is_err());

        let bad = ChannelHeader::new(4096, WakeBackend::Futex, 0);
        bad.producer.head.store(5000, Ordering::Relaxed);
        assert!(bad.validate("t").is_err());
    }

    #[test]
    fn test_attach_mask() {
        let header = ChannelHeader::new(4096, WakeBackend::Futex, 0);
        assert!(header.try_attach(1));
        assert!(!header.try_attach(1));
        assert!(header.try_attach(2));
        header.detach(1);
        assert!(header.try_attach(1));
    }
}
