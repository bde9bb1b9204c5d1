//! # winfifo Benchmark Driver
//!
//! Pushes a deterministic sequence of 32-bit words from a writer thread to a
//! reader thread through one channel and verifies the reader's checksum.
//!
//! - [`config`] - `BenchConfig` TOML layout and validation
//! - [`driver`] - writer/reader loops and the run report

pub mod config;
pub mod driver;

pub use config::{BenchConfig, WorkloadConfig};
pub use driver::{BenchReport, Checksum, run_bench, run_on};
