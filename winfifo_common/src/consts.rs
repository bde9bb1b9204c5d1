//! Workspace-wide defaults.
//!
//! Imported by the benchmark driver and the config layer.

/// Default configuration file looked up by the benchmark driver.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/winfifo/bench.toml";

/// Default number of 32-bit words pushed through the ring by the benchmark.
pub const DEFAULT_WORD_COUNT: u64 = 1_000_000;

/// Maximum words the benchmark reader consumes per span.
pub const DEFAULT_READER_BATCH_WORDS: usize = 512;

/// Maximum words the benchmark writer produces per span.
pub const DEFAULT_WRITER_BATCH_WORDS: usize = 256;

/// Modulus applied to produced words (keeps the sequence inside `i32`).
pub const WORD_MODULUS: u32 = 0x5ffe_fefe;

/// Modulus applied to consumed words before folding them into the checksum.
pub const CHECKSUM_MODULUS: u32 = 0x3461_d349;
