//! Ring and header constants.
//!
//! These constants define the fundamental parameters of a winfifo channel.
//! Every other crate imports them from here.

/// CPU cache line size in bytes.
///
/// Producer-written and consumer-written header fields are kept at least this
/// far apart to avoid false sharing between the two hot lines.
pub const CACHE_LINE_SIZE: usize = 64;

/// Page size assumed for channel allocations.
pub const PAGE_SIZE: usize = 4096;

/// Smallest accepted ring capacity in bytes.
pub const MIN_CAPACITY: usize = 64;

/// Largest accepted ring capacity in bytes.
///
/// Counters are 32-bit and `head - tail` must stay unambiguous under
/// wrapping subtraction, so the ring can hold at most 2^31 bytes.
pub const MAX_CAPACITY: usize = 1 << 31;

/// Default ring capacity (16 KiB).
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Wait marker value meaning "nobody is asleep on this counter".
///
/// Markers are 64-bit and hold a 32-bit counter while a side sleeps, so the
/// unset value can never equal a real counter.
pub const WAIT_UNSET: u64 = u64::MAX;

/// Magic bytes identifying an initialized channel header: `"WINFIFO\0"`.
pub const WINFIFO_MAGIC: [u8; 8] = *b"WINFIFO\0";

/// Directory holding named channel segments.
pub const SHM_DIR: &str = "/dev/shm";

/// File name prefix for named channel segments.
pub const SEGMENT_PREFIX: &str = "winfifo_";
