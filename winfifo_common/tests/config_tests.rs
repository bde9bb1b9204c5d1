//! Config loading tests against files on disk.

use serde::Deserialize;
use std::fs;
use tempfile::TempDir;
use winfifo_common::config::{
    ChannelConfig, ConfigError, ConfigLoader, LogLevel, SharedConfig, WakeBackend, WindowConfig,
};

#[derive(Debug, Deserialize)]
struct AppConfig {
    shared: SharedConfig,
    #[serde(default)]
    channel: ChannelConfig,
    #[serde(default)]
    reader: WindowConfig,
    #[serde(default)]
    writer: WindowConfig,
}

#[test]
fn minimal_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.toml");
    fs::write(
        &path,
        r#"
[shared]
service_name = "fifo-test"
"#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.shared.log_level, LogLevel::Info);
    assert_eq!(config.channel, ChannelConfig::default());
    assert_eq!(config.reader, WindowConfig::default());
    assert_eq!(config.writer, WindowConfig::default());
}

#[test]
fn full_file_round_trips_every_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.toml");
    fs::write(
        &path,
        r#"
[shared]
log_level = "trace"
service_name = "fifo-test"

[channel]
capacity = 4096
wake_backend = "eventfd"
spin_count = 100

[reader]
min_batch = 4
pull_batch = 1024

[writer]
min_batch = 256
pull_batch = 128
"#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.channel.capacity, 4096);
    assert_eq!(config.channel.wake_backend, WakeBackend::EventFd);
    assert_eq!(config.channel.spin_count, 100);
    assert!(config.channel.validate().is_ok());

    assert_eq!(config.reader.min_batch, 4);
    assert_eq!(config.reader.pull_batch, 1024);

    let writer = config.writer.normalized();
    assert_eq!(writer.min_batch, 256);
    assert_eq!(writer.pull_batch, 256);
}

#[test]
fn unknown_backend_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.toml");
    fs::write(
        &path,
        r#"
[shared]
service_name = "fifo-test"

[channel]
wake_backend = "pipe"
"#,
    )
    .unwrap();

    assert!(matches!(
        AppConfig::load(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn non_power_of_two_capacity_fails_validation() {
    let config = ChannelConfig::from_toml("capacity = 16000").unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}
