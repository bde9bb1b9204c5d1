//! Channel creation, attachment and shared-state accessors

use crate::error::{FifoError, FifoResult};
use crate::header::{ChannelHeader, HEADER_SIZE};
use crate::platform::{
    attach_segment_mmap, create_anonymous_mmap, create_segment_mmap, unlink_segment,
};
use crate::stats::{ChannelStats, StatsCounters};
use crate::wake::{WakeHandle, new_wake_handle};
use crate::window::{Role, Span};
use memmap2::MmapMut;
use std::fmt;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::atomic::{Ordering, fence};
use tracing::{debug, trace};
use winfifo_common::config::{ChannelConfig, WakeBackend};
use winfifo_common::shm::consts::{SEGMENT_PREFIX, SHM_DIR};

/// Where the channel block lives
enum Backing {
    /// Private anonymous mapping
    Anonymous,
    /// File under `/dev/shm`; the creator unlinks it on drop
    Named {
        name: String,
        path: PathBuf,
        owner: bool,
    },
}

/// Fixed-capacity SPSC byte ring shared by one reader and one writer window
///
/// The block is `[ChannelHeader | data]`, page-aligned. The data region is
/// never handed out directly: windows address it through
/// [`Channel::index`] and the span views they own.
pub struct Channel {
    mmap: MmapMut,
    base: NonNull<u8>,
    capacity: u32,
    mask: u32,
    spin_count: u32,
    backing: Backing,
    head_wake: Box<dyn WakeHandle>,
    tail_wake: Box<dyn WakeHandle>,
    stats: StatsCounters,
}

// SAFETY: header fields are atomics with a single writer each, and the data
// region is partitioned between the one reader and one writer window by the
// published counters. Role claims in the header keep a second window of the
// same role from aliasing a span.
unsafe impl Send for Channel {}
unsafe impl Sync for Channel {}

impl Channel {
    /// Create an in-process channel with default settings
    pub fn create(capacity: usize) -> FifoResult<Self> {
        Self::with_config(&ChannelConfig::with_capacity(capacity))
    }

    /// Create an in-process channel
    pub fn with_config(config: &ChannelConfig) -> FifoResult<Self> {
        Self::with_start_position(config, 0)
    }

    /// Create an in-process channel with both counters starting at `position`
    ///
    /// Counters wrap modulo 2^32; starting near `u32::MAX` exercises the wrap
    /// without pushing 4 GiB through the ring first.
    pub fn with_start_position(config: &ChannelConfig, position: u32) -> FifoResult<Self> {
        let capacity = validated_capacity(config)?;
        let mut mmap = create_anonymous_mmap(HEADER_SIZE + capacity as usize)?;
        init_header(&mut mmap, capacity, config.wake_backend, position);

        // Wake handles drop in reverse on error, releasing the block last.
        let head_wake = new_wake_handle(config.wake_backend, false)?;
        let tail_wake = new_wake_handle(config.wake_backend, false)?;

        debug!(
            capacity,
            backend = ?config.wake_backend,
            position,
            "created anonymous channel"
        );

        Ok(Self::from_parts(
            mmap,
            capacity,
            config.spin_count,
            Backing::Anonymous,
            head_wake,
            tail_wake,
        ))
    }

    /// Create a named channel under `/dev/shm` that other processes can attach
    ///
    /// Requires the futex backend: the wait words live inside the mapping.
    pub fn create_named(name: &str, config: &ChannelConfig) -> FifoResult<Self> {
        let capacity = validated_capacity(config)?;
        if config.wake_backend != WakeBackend::Futex {
            return Err(FifoError::UnsupportedBackend {
                backend: config.wake_backend,
            });
        }

        let path = segment_path(name);
        let mut mmap = create_segment_mmap(&path, name, HEADER_SIZE + capacity as usize)?;
        init_header(&mut mmap, capacity, config.wake_backend, 0);

        let head_wake = new_wake_handle(config.wake_backend, true);
        let tail_wake = new_wake_handle(config.wake_backend, true);
        let (head_wake, tail_wake) = match (head_wake, tail_wake) {
            (Ok(head), Ok(tail)) => (head, tail),
            (Err(e), _) | (_, Err(e)) => {
                unlink_segment(&path);
                return Err(e);
            }
        };

        debug!(name, capacity, path = %path.display(), "created named channel");

        Ok(Self::from_parts(
            mmap,
            capacity,
            config.spin_count,
            Backing::Named {
                name: name.to_string(),
                path,
                owner: true,
            },
            head_wake,
            tail_wake,
        ))
    }

    /// Attach to a named channel created by [`Channel::create_named`]
    pub fn attach_named(name: &str, spin_count: u32) -> FifoResult<Self> {
        let path = segment_path(name);
        let mut mmap = attach_segment_mmap(&path, name)?;

        if mmap.len() < HEADER_SIZE {
            return Err(FifoError::InvalidHeader {
                name: name.to_string(),
                reason: format!("segment is {} bytes", mmap.len()),
            });
        }

        fence(Ordering::Acquire);
        let header = unsafe { &*(mmap.as_mut_ptr() as *const ChannelHeader) };
        let backend = header.validate(name)?;
        let capacity = header.meta.capacity;

        if mmap.len() < HEADER_SIZE + capacity as usize {
            return Err(FifoError::InvalidHeader {
                name: name.to_string(),
                reason: format!("segment too short for capacity {capacity}"),
            });
        }
        if backend != WakeBackend::Futex {
            return Err(FifoError::UnsupportedBackend { backend });
        }

        let head_wake = new_wake_handle(backend, true)?;
        let tail_wake = new_wake_handle(backend, true)?;

        debug!(name, capacity, used = header.used(), "attached named channel");

        Ok(Self::from_parts(
            mmap,
            capacity,
            spin_count,
            Backing::Named {
                name: name.to_string(),
                path,
                owner: false,
            },
            head_wake,
            tail_wake,
        ))
    }

    fn from_parts(
        mut mmap: MmapMut,
        capacity: u32,
        spin_count: u32,
        backing: Backing,
        head_wake: Box<dyn WakeHandle>,
        tail_wake: Box<dyn WakeHandle>,
    ) -> Self {
        let base = NonNull::from(&mut mmap[..]).cast::<u8>();
        Self {
            mmap,
            base,
            capacity,
            mask: capacity - 1,
            spin_count,
            backing,
            head_wake,
            tail_wake,
            stats: StatsCounters::default(),
        }
    }

    /// Shared header
    pub fn header(&self) -> &ChannelHeader {
        unsafe { &*(self.base.as_ptr() as *const ChannelHeader) }
    }

    /// Ring capacity in bytes
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Physical data offset of a counter value
    #[inline(always)]
    pub fn index(&self, counter: u32) -> usize {
        (counter & self.mask) as usize
    }

    /// Published producer position
    pub fn head(&self) -> u32 {
        self.header().producer.head.load(Ordering::Acquire)
    }

    /// Published consumer position
    pub fn tail(&self) -> u32 {
        self.header().consumer.tail.load(Ordering::Acquire)
    }

    /// Bytes published and not yet released
    pub fn used(&self) -> u32 {
        self.header().used()
    }

    /// Spin iterations before a side commits to sleeping
    pub fn spin_count(&self) -> u32 {
        self.spin_count
    }

    /// Wake backend of this channel
    pub fn wake_backend(&self) -> WakeBackend {
        self.head_wake.backend()
    }

    /// Segment name for named channels
    pub fn name(&self) -> Option<&str> {
        match &self.backing {
            Backing::Anonymous => None,
            Backing::Named { name, .. } => Some(name),
        }
    }

    /// Total mapped size including the header
    pub fn mapped_len(&self) -> usize {
        self.mmap.len()
    }

    /// Diagnostic counters
    pub fn stats(&self) -> ChannelStats {
        self.stats.snapshot()
    }

    pub(crate) fn counters(&self) -> &StatsCounters {
        &self.stats
    }

    pub(crate) fn claim(&self, role: Role) -> FifoResult<()> {
        if self.header().try_attach(role.bit()) {
            Ok(())
        } else {
            Err(FifoError::RoleInUse {
                role: role.as_str(),
            })
        }
    }

    pub(crate) fn release(&self, role: Role) {
        self.header().detach(role.bit());
    }

    /// View of a span owned by the calling window
    ///
    /// # Safety
    ///
    /// `span` must lie inside the caller's window, which no other party
    /// writes until the window publishes it.
    pub(crate) unsafe fn bytes(&self, span: Span) -> &[u8] {
        debug_assert!(span.offset + span.len <= self.capacity as usize);
        unsafe {
            std::slice::from_raw_parts(self.base.as_ptr().add(HEADER_SIZE + span.offset), span.len)
        }
    }

    /// Mutable view of a span owned by the calling writer window
    ///
    /// # Safety
    ///
    /// `span` must lie inside the writer window, which the reader does not
    /// touch until the writer publishes it, and no other view of it may be
    /// live.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn bytes_mut(&self, span: Span) -> &mut [u8] {
        debug_assert!(span.offset + span.len <= self.capacity as usize);
        unsafe {
            std::slice::from_raw_parts_mut(
                self.base.as_ptr().add(HEADER_SIZE + span.offset),
                span.len,
            )
        }
    }

    /// Signal the reader if it sleeps on the pre-publish `head`
    pub(crate) fn notify_reader(&self, old_head: u32) {
        fence(Ordering::SeqCst);
        let header = self.header();
        if header.consumer.head_wait.load(Ordering::Relaxed) == u64::from(old_head) {
            self.stats.record_wake(Role::Reader);
            trace!(old_head, "waking reader");
            self.head_wake.signal(&header.producer.head);
        }
    }

    /// Signal the writer if it sleeps on the pre-publish `tail`
    pub(crate) fn notify_writer(&self, old_tail: u32) {
        fence(Ordering::SeqCst);
        let header = self.header();
        if header.producer.tail_wait.load(Ordering::Relaxed) == u64::from(old_tail) {
            self.stats.record_wake(Role::Writer);
            trace!(old_tail, "waking writer");
            self.tail_wake.signal(&header.consumer.tail);
        }
    }

    pub(crate) fn head_wake(&self) -> &dyn WakeHandle {
        self.head_wake.as_ref()
    }

    pub(crate) fn tail_wake(&self) -> &dyn WakeHandle {
        self.tail_wake.as_ref()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name())
            .field("capacity", &self.capacity)
            .field("backend", &self.wake_backend())
            .field("head", &self.head())
            .field("tail", &self.tail())
            .finish()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Backing::Named {
            path, owner: true, ..
        } = &self.backing
        {
            unlink_segment(path);
        }
    }
}

/// Path of the backing file for a named channel
pub fn segment_path(name: &str) -> PathBuf {
    PathBuf::from(SHM_DIR).join(format!("{SEGMENT_PREFIX}{name}"))
}

fn validated_capacity(config: &ChannelConfig) -> FifoResult<u32> {
    config.validate().map_err(|_| FifoError::InvalidCapacity {
        capacity: config.capacity,
    })?;
    Ok(config.capacity as u32)
}

fn init_header(mmap: &mut MmapMut, capacity: u32, backend: WakeBackend, position: u32) {
    let header = mmap.as_mut_ptr() as *mut ChannelHeader;
    unsafe { header.write(ChannelHeader::new(capacity, backend, position)) };
    fence(Ordering::Release);
}
