//! winfifo common library
//!
//! Shared constants and configuration loading utilities for the winfifo
//! workspace crates.
//!
//! # Module Structure
//!
//! - [`shm`] - Ring layout constants (capacity bounds, cache line, sentinel)
//! - [`consts`] - Benchmark defaults
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use winfifo_common::shm::consts::*;
//! use winfifo_common::config::{ConfigLoader, ChannelConfig, WindowConfig};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod shm;
