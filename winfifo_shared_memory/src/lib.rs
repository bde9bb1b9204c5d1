//! # winfifo Shared Memory Byte Ring
//!
//! A single-producer single-consumer byte stream over a fixed-capacity ring
//! in shared memory. Each side works through a private [`Window`]: it eats
//! spans locally and publishes them in batches with [`Window::exchange`].
//! When a side runs out of data or space it sleeps on a [`WakeHandle`] and
//! the opposite side wakes it only if it is actually sleeping.
//!
//! ## Features
//!
//! - **Batched publishing**: one release store per exchange, not per byte
//! - **Cache-line separated counters**: each header line has one writing side
//! - **Wake elision**: no syscall unless the other side recorded a wait marker
//! - **Pluggable wake backends**: futex, eventfd or mutex + condvar
//! - **Named channels**: `/dev/shm` segments attachable from another process
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────────────┐    ┌─────────────────┐
//! │  Writer Window  │    │           Channel            │    │  Reader Window  │
//! │                 │    │ meta     | magic, capacity   │    │                 │
//! │ start, len      ├───►│ producer | head, tail_wait   ├───►│ start, len      │
//! │ min/pull batch  │    │ consumer | tail, head_wait   │    │ min/pull batch  │
//! │                 │◄───┤ data     | capacity bytes    │◄───┤                 │
//! └─────────────────┘    └──────────────────────────────┘    └─────────────────┘
//! ```
//!
//! `head` and `tail` count bytes ever published and released, modulo 2^32.
//! `head - tail` is always in `[0, capacity]`.
//!
//! ## Usage
//!
//! ### Producer and consumer in one process
//!
//! ```rust
//! use winfifo_shared_memory::{Channel, Window, WindowConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Channel::create(4096)?;
//! let mut writer = Window::writer(&channel, WindowConfig::default())?;
//! let mut reader = Window::reader(&channel, WindowConfig::default())?;
//!
//! writer.exchange();
//! assert_eq!(writer.write_from(b"hello"), 5);
//! writer.exchange();
//!
//! reader.exchange();
//! let mut buf = [0u8; 5];
//! assert_eq!(reader.read_into(&mut buf), 5);
//! reader.exchange();
//! assert_eq!(&buf, b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! ### Zero-copy spans
//!
//! ```rust
//! use winfifo_shared_memory::{Channel, Window, WindowConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Channel::create(4096)?;
//! let mut writer = Window::writer(&channel, WindowConfig::default())?;
//!
//! writer.exchange();
//! let free = writer.peek_bytes_mut();
//! free[..4].copy_from_slice(&7u32.to_le_bytes());
//! writer.eat_span(4);
//! writer.exchange();
//! assert_eq!(channel.used(), 4);
//! # Ok(())
//! # }
//! ```
//!
//! ### Blocking threads
//!
//! ```rust
//! use winfifo_shared_memory::{Channel, Window, WindowConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Channel::create(16384)?;
//! let mut writer = Window::writer(&channel, WindowConfig::blocking(4))?;
//! let mut reader = Window::reader(&channel, WindowConfig::blocking(4))?;
//!
//! let sum = std::thread::scope(|s| {
//!     s.spawn(move || {
//!         for word in 1..=1000u32 {
//!             writer.exchange(); // sleeps until 4 bytes are free
//!             writer.write_from(&word.to_le_bytes());
//!         }
//!         writer.exchange();
//!     });
//!
//!     let mut sum = 0u64;
//!     for _ in 0..1000 {
//!         reader.exchange(); // sleeps until 4 bytes are published
//!         let mut buf = [0u8; 4];
//!         reader.read_into(&mut buf);
//!         sum += u64::from(u32::from_le_bytes(buf));
//!     }
//!     reader.exchange();
//!     sum
//! });
//! assert_eq!(sum, 500_500);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Setup operations return `Result<T, FifoError>`:
//!
//! ```rust,no_run
//! use winfifo_shared_memory::{Channel, FifoError};
//!
//! match Channel::attach_named("bench", 0) {
//!     Ok(channel) => { /* attach windows */ }
//!     Err(FifoError::NotFound { name }) => {
//!         eprintln!("Channel '{}' not found - check producer is running", name);
//!     }
//!     Err(e) => eprintln!("Unexpected error: {}", e),
//! }
//! ```
//!
//! The hot path does not return errors. Corrupt window state and role
//! misuse panic after logging the window state; the release profile aborts.
//!
//! ## Thread Safety
//!
//! - **Channel**: `Send + Sync`, shared by reference between the two sides
//! - **Window**: one per role per channel, enforced by the header claim mask
//! - **Stats**: relaxed counters, diagnostic only

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod error;
mod exchange;
pub mod header;
pub mod platform;
pub mod stats;
mod wait;
pub mod wake;
pub mod window;

pub use channel::{Channel, segment_path};
pub use error::{FifoError, FifoResult};
pub use header::{ChannelHeader, HEADER_SIZE};
pub use stats::ChannelStats;
pub use wake::{WakeHandle, new_wake_handle};
pub use window::{Role, Span, Window};
pub use winfifo_common::config::{ChannelConfig, WakeBackend, WindowConfig};

/// Install a compact stderr subscriber for channel diagnostics
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Thread names are
/// printed so reader and writer lines can be told apart. Returns `false` if a
/// global subscriber was already set, in which case nothing changes.
pub fn init_tracing() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_installs_once() {
        init_tracing();
        assert!(!init_tracing());
        assert!(!init_tracing());
    }
}
