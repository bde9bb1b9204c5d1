//! Prelude module for common re-exports.
//!
//! ```rust
//! use winfifo_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ChannelConfig, ConfigError, ConfigLoader, SharedConfig, WakeBackend, WindowConfig,
};

// ─── Ring Constants ─────────────────────────────────────────────────
pub use crate::shm::consts::{CACHE_LINE_SIZE, DEFAULT_CAPACITY, WAIT_UNSET};
