//! # winfifo Benchmark
//!
//! Streams words through a channel between a writer and a reader thread,
//! then prints the exchange, wake and sleep counters of both sides.
//!
//! Settings come from an optional TOML file (`--config`, or
//! `/etc/winfifo/bench.toml` when present); command-line flags override it.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use winfifo_bench::{BenchConfig, BenchReport, run_bench, run_on};
use winfifo_common::config::{ConfigLoader, LogLevel, WakeBackend};
use winfifo_common::consts::DEFAULT_CONFIG_PATH;
use winfifo_shared_memory::Channel;

/// winfifo throughput benchmark
#[derive(Parser, Debug)]
#[command(name = "winfifo_bench")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "SPSC shared-memory ring throughput benchmark")]
struct Args {
    /// Path to the benchmark TOML file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of 32-bit words to stream.
    #[arg(short, long)]
    words: Option<u64>,

    /// Ring capacity in bytes (power of two).
    #[arg(long)]
    capacity: Option<usize>,

    /// Wake backend.
    #[arg(long, value_parser = parse_backend)]
    backend: Option<WakeBackend>,

    /// Spin iterations before sleeping.
    #[arg(long)]
    spin: Option<u32>,

    /// Reader blocking threshold in bytes (0 or 4).
    #[arg(long)]
    reader_min_batch: Option<u32>,

    /// Writer blocking threshold in bytes.
    #[arg(long)]
    writer_min_batch: Option<u32>,

    /// CPU core for the reader thread.
    #[arg(long)]
    reader_cpu: Option<usize>,

    /// CPU core for the writer thread.
    #[arg(long)]
    writer_cpu: Option<usize>,

    /// Back the ring with a named /dev/shm segment instead of anonymous memory.
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and the final report in JSON format.
    #[arg(long)]
    json: bool,
}

fn parse_backend(value: &str) -> Result<WakeBackend, String> {
    match value {
        "futex" => Ok(WakeBackend::Futex),
        "eventfd" => Ok(WakeBackend::EventFd),
        "condvar" => Ok(WakeBackend::Condvar),
        other => Err(format!(
            "unknown backend '{other}' (expected futex, eventfd or condvar)"
        )),
    }
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };
    setup_tracing(&args, config.shared.log_level);

    info!("winfifo bench v{} starting...", env!("CARGO_PKG_VERSION"));

    match run(&args, &config) {
        Ok(report) if report.is_consistent() => {
            print_report(&args, &report);
        }
        Ok(report) => {
            print_report(&args, &report);
            error!(
                got = ?report.checksum,
                expected = ?report.expected,
                "checksum mismatch"
            );
            process::exit(2);
        }
        Err(e) => {
            error!("FATAL: {e}");
            process::exit(1);
        }
    }
}

/// File settings first, then command-line overrides.
fn load_config(args: &Args) -> Result<BenchConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::load(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                BenchConfig::load(&default_path)?
            } else {
                BenchConfig::default()
            }
        }
    };

    if let Some(words) = args.words {
        config.bench.words = words;
    }
    if let Some(capacity) = args.capacity {
        config.channel.capacity = capacity;
    }
    if let Some(backend) = args.backend {
        config.channel.wake_backend = backend;
    }
    if let Some(spin) = args.spin {
        config.channel.spin_count = spin;
    }
    if let Some(min_batch) = args.reader_min_batch {
        config.reader.min_batch = min_batch;
    }
    if let Some(min_batch) = args.writer_min_batch {
        config.writer.min_batch = min_batch;
    }
    if args.reader_cpu.is_some() {
        config.bench.reader_cpu = args.reader_cpu;
    }
    if args.writer_cpu.is_some() {
        config.bench.writer_cpu = args.writer_cpu;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &BenchConfig) -> Result<BenchReport, Box<dyn std::error::Error>> {
    let report = match &args.name {
        Some(name) => {
            let channel = Channel::create_named(name, &config.channel)?;
            let path = winfifo_shared_memory::segment_path(name);
            info!(name, path = %path.display(), "using named channel");
            run_on(&channel, config)?
        }
        None => run_bench(config)?,
    };
    Ok(report)
}

fn print_report(args: &Args, report: &BenchReport) {
    if args.json {
        match serde_json::to_string(report) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!("failed to serialize report: {e}"),
        }
        return;
    }

    let stats = &report.stats;
    info!(
        "streamed {} words in {:.3}s ({:.1} MiB/s)",
        report.words,
        report.elapsed.as_secs_f64(),
        report.mib_per_sec()
    );
    info!("writer_exchange_count = {}", stats.writer_exchanges);
    info!("writer_wake_count = {}", stats.writer_wakes);
    info!("writer_sleep_count = {}", stats.writer_sleeps);
    info!("reader_exchange_count = {}", stats.reader_exchanges);
    info!("reader_wake_count = {}", stats.reader_wakes);
    info!("reader_sleep_count = {}", stats.reader_sleeps);
    info!(
        "checksum = {:#010x}, xor = {:#010x}",
        report.checksum.sum, report.checksum.xor
    );
}

fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match log_level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
