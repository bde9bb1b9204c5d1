//! Error types for channel operations

use thiserror::Error;
use winfifo_common::config::{ConfigError, WakeBackend};

/// Errors that can occur while creating or attaching to a channel
#[derive(Error, Debug)]
pub enum FifoError {
    /// Backing memory could not be mapped
    #[error("Failed to allocate {size} byte channel block: {source}")]
    Allocation {
        /// Requested block size in bytes
        size: usize,
        /// Source IO error
        source: std::io::Error,
    },

    /// Wake handle primitive could not be constructed
    #[error("Failed to create {backend:?} wake handle: {source}")]
    WakeHandle {
        /// Backend that failed
        backend: WakeBackend,
        /// Source nix error
        source: nix::Error,
    },

    /// Ring capacity rejected
    #[error("Invalid channel capacity: {capacity} bytes (power of two, 64B-2GiB)")]
    InvalidCapacity {
        /// Requested capacity in bytes
        capacity: usize,
    },

    /// Window batching policy rejected
    #[error("Invalid window policy: {reason}")]
    InvalidWindow {
        /// Why the policy was rejected
        reason: String,
    },

    /// A window of this role is already attached to the channel
    #[error("A {role} window is already attached to this channel")]
    RoleInUse {
        /// Role that is taken
        role: &'static str,
    },

    /// Named segment already exists
    #[error("Channel segment already exists: {name}")]
    AlreadyExists {
        /// Segment name
        name: String,
    },

    /// Named segment not found
    #[error("Channel segment not found: {name}")]
    NotFound {
        /// Segment name
        name: String,
    },

    /// Mapped segment does not carry a valid channel header
    #[error("Invalid channel header in segment {name}: {reason}")]
    InvalidHeader {
        /// Segment name
        name: String,
        /// What failed validation
        reason: String,
    },

    /// Wake backend cannot serve this kind of channel
    #[error("Wake backend {backend:?} cannot be used with named channels")]
    UnsupportedBackend {
        /// Offending backend
        backend: WakeBackend,
    },

    /// Configuration error
    #[error("Configuration error: {source}")]
    Config {
        /// Source config error
        #[from]
        source: ConfigError,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for channel operations
pub type FifoResult<T> = Result<T, FifoError>;
