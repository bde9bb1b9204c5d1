//! Benchmark configuration file
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "winfifo-bench"
//!
//! [channel]
//! capacity = 16384
//! wake_backend = "futex"
//!
//! [bench]
//! words = 1000000
//! reader_cpu = 0
//! writer_cpu = 1
//!
//! [writer]
//! min_batch = 64
//! ```
//!
//! The reader drains the stream by word count, so its `min_batch` may not
//! exceed one word: a larger threshold could never be met by the last words.

use serde::{Deserialize, Serialize};
use winfifo_common::config::{ChannelConfig, ConfigError, SharedConfig, WindowConfig};
use winfifo_common::consts::{
    DEFAULT_READER_BATCH_WORDS, DEFAULT_WORD_COUNT, DEFAULT_WRITER_BATCH_WORDS,
};

/// Bytes per benchmark word
pub const WORD_BYTES: u32 = 4;

/// Workload parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// 32-bit words pushed from writer to reader
    #[serde(default = "default_words")]
    pub words: u64,

    /// Most words the reader folds per span
    #[serde(default = "default_reader_batch")]
    pub reader_batch_words: usize,

    /// Most words the writer fills per span
    #[serde(default = "default_writer_batch")]
    pub writer_batch_words: usize,

    /// Pin the reader thread to this CPU
    #[serde(default)]
    pub reader_cpu: Option<usize>,

    /// Pin the writer thread to this CPU
    #[serde(default)]
    pub writer_cpu: Option<usize>,
}

fn default_words() -> u64 {
    DEFAULT_WORD_COUNT
}

fn default_reader_batch() -> usize {
    DEFAULT_READER_BATCH_WORDS
}

fn default_writer_batch() -> usize {
    DEFAULT_WRITER_BATCH_WORDS
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            words: DEFAULT_WORD_COUNT,
            reader_batch_words: DEFAULT_READER_BATCH_WORDS,
            writer_batch_words: DEFAULT_WRITER_BATCH_WORDS,
            reader_cpu: None,
            writer_cpu: None,
        }
    }
}

/// Whole benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Logging and instance name
    #[serde(default = "default_shared")]
    pub shared: SharedConfig,

    /// Ring parameters
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Workload parameters
    #[serde(default)]
    pub bench: WorkloadConfig,

    /// Reader batching policy
    #[serde(default)]
    pub reader: WindowConfig,

    /// Writer batching policy
    #[serde(default)]
    pub writer: WindowConfig,
}

fn default_shared() -> SharedConfig {
    SharedConfig {
        log_level: Default::default(),
        service_name: "winfifo-bench".to_string(),
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            shared: default_shared(),
            channel: ChannelConfig::default(),
            bench: WorkloadConfig::default(),
            reader: WindowConfig::default(),
            writer: WindowConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Validate every section against the others
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` on the first failing check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.channel.validate()?;
        self.reader.validate(self.channel.capacity)?;
        self.writer.validate(self.channel.capacity)?;

        if self.bench.reader_batch_words == 0 || self.bench.writer_batch_words == 0 {
            return Err(ConfigError::ValidationError(
                "batch sizes must be at least one word".to_string(),
            ));
        }
        if self.reader.min_batch > WORD_BYTES {
            return Err(ConfigError::ValidationError(format!(
                "reader min_batch {} exceeds one word",
                self.reader.min_batch
            )));
        }
        if self.writer.min_batch % WORD_BYTES != 0 {
            return Err(ConfigError::ValidationError(format!(
                "writer min_batch {} is not a whole number of words",
                self.writer.min_batch
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winfifo_common::config::{ConfigLoader, WakeBackend};

    #[test]
    fn test_empty_file_is_the_default_workload() {
        let config = BenchConfig::from_toml("").unwrap();
        assert_eq!(config.bench, WorkloadConfig::default());
        assert_eq!(config.reader, WindowConfig::default());
        assert_eq!(config.shared.service_name, "winfifo-bench");
        config.validate().unwrap();
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = BenchConfig::from_toml(
            r#"
[channel]
capacity = 4096
wake_backend = "condvar"

[bench]
words = 10
writer_cpu = 3

[writer]
min_batch = 64
pull_batch = 128
"#,
        )
        .unwrap();
        assert_eq!(config.channel.capacity, 4096);
        assert_eq!(config.channel.wake_backend, WakeBackend::Condvar);
        assert_eq!(config.bench.words, 10);
        assert_eq!(config.bench.writer_cpu, Some(3));
        assert_eq!(config.bench.reader_cpu, None);
        assert_eq!(config.writer.min_batch, 64);
        config.validate().unwrap();
    }

    #[test]
    fn test_window_thresholds_checked() {
        let mut config = BenchConfig::default();
        config.writer.min_batch = 6;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = BenchConfig::default();
        config.reader.min_batch = 8;
        assert!(config.validate().is_err());
        config.reader.min_batch = 4;
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_batch_rejected() {
        let mut config = BenchConfig::default();
        config.bench.writer_batch_words = 0;
        assert!(config.validate().is_err());
    }
}
