//! TOML settings for channels, windows and the tools built on them.
//!
//! Every section is a plain serde struct; [`ConfigLoader`] gives any of
//! them (and any struct assembled from them) `load` and `from_toml`.
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use std::path::Path;
//! use winfifo_common::config::{ChannelConfig, ConfigError, ConfigLoader, SharedConfig};
//!
//! #[derive(Debug, Deserialize)]
//! struct Settings {
//!     shared: SharedConfig,
//!     channel: ChannelConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let settings = Settings::load(Path::new("winfifo.toml"))?;
//!     settings.shared.validate()?;
//!     settings.channel.validate()?;
//!     Ok(())
//! }
//! ```

use crate::shm::consts::{DEFAULT_CAPACITY, MAX_CAPACITY, MIN_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Reasons a settings file could not be turned into a usable value.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("config file does not exist")]
    FileNotFound,

    /// The file could not be read or is not valid TOML for the target type.
    #[error("cannot parse config: {0}")]
    ParseError(String),

    /// The values parsed but are out of range or inconsistent.
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// Verbosity of the tracing subscriber, spelled in lowercase in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-sleep and per-wake events.
    Trace,
    /// Setup steps and thread lifecycle.
    Debug,
    /// Start, stop and final counters.
    #[default]
    Info,
    /// Recoverable oddities.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `[shared]` section carried by every winfifo tool.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "winfifo-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Name reported in logs; must not be empty.
    pub service_name: String,
}

impl SharedConfig {
    /// Reject an empty `service_name`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "shared.service_name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Blocking primitive used for the two wake handles of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum WakeBackend {
    /// Kernel futex on the counter word itself (compare-and-block).
    #[default]
    Futex = 1,
    /// Counting eventfd per sleeper role.
    EventFd = 2,
    /// Mutex + condition variable, in-process only.
    Condvar = 3,
}

impl WakeBackend {
    /// Decode the tag stored in a channel header.
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Futex),
            2 => Some(Self::EventFd),
            3 => Some(Self::Condvar),
            _ => None,
        }
    }
}

/// Channel construction parameters.
///
/// # TOML Example
///
/// ```toml
/// [channel]
/// capacity = 16384
/// wake_backend = "eventfd"
/// spin_count = 0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Ring capacity in bytes. Power of two.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Wake handle implementation.
    #[serde(default)]
    pub wake_backend: WakeBackend,

    /// Iterations a side spins re-checking the opposite counter before it
    /// commits to sleeping.
    #[serde(default)]
    pub spin_count: u32,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            wake_backend: WakeBackend::default(),
            spin_count: 0,
        }
    }
}

impl ChannelConfig {
    /// Config with the given capacity and default everything else.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `capacity` is not a power of
    /// two inside `[MIN_CAPACITY, MAX_CAPACITY]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.capacity.is_power_of_two()
            || self.capacity < MIN_CAPACITY
            || self.capacity > MAX_CAPACITY
        {
            return Err(ConfigError::ValidationError(format!(
                "capacity {} must be a power of two in [{MIN_CAPACITY}, {MAX_CAPACITY}]",
                self.capacity
            )));
        }
        Ok(())
    }
}

/// Batching policy of one window.
///
/// `min_batch` is the smallest usable length an exchange may return;
/// anything less blocks. While the cached length is below `pull_batch`
/// an exchange re-reads the opposite counter to grab everything available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowConfig {
    /// Blocking threshold in bytes.
    #[serde(default)]
    pub min_batch: u32,

    /// Refresh threshold in bytes.
    #[serde(default = "default_pull_batch")]
    pub pull_batch: u32,
}

fn default_pull_batch() -> u32 {
    u32::MAX
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_batch: 0,
            pull_batch: default_pull_batch(),
        }
    }
}

impl WindowConfig {
    /// Policy that blocks until `min_batch` bytes are usable.
    pub fn blocking(min_batch: u32) -> Self {
        Self {
            min_batch,
            ..Self::default()
        }
    }

    /// Effective policy: pulling never undershoots the required minimum.
    pub fn normalized(self) -> Self {
        Self {
            min_batch: self.min_batch,
            pull_batch: self.pull_batch.max(self.min_batch),
        }
    }

    /// Validate the policy against a ring of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `min_batch` exceeds the
    /// capacity, since such an exchange could never return.
    pub fn validate(&self, capacity: usize) -> Result<(), ConfigError> {
        if self.min_batch as usize > capacity {
            return Err(ConfigError::ValidationError(format!(
                "min_batch {} exceeds channel capacity {capacity}",
                self.min_batch
            )));
        }
        Ok(())
    }
}

/// `load`/`from_toml` for any deserializable settings type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Read and parse `path`.
    ///
    /// A missing file maps to [`ConfigError::FileNotFound`]; any other I/O
    /// or syntax problem maps to [`ConfigError::ParseError`].
    fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::FileNotFound),
            Err(e) => Err(ConfigError::ParseError(format!("{}: {e}", path.display()))),
        }
    }

    /// Parse settings already held in memory.
    fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
