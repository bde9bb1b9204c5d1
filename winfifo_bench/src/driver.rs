//! Writer and reader threads of the benchmark
//!
//! The writer fills spans with `index % WORD_MODULUS` and the reader folds
//! every word into a wrapping checksum plus an XOR. Both sides mirror the
//! classic window loop: exchange, explicitly wait when less than one word is
//! usable, otherwise work on the peeked span and eat it.

use crate::config::{BenchConfig, WORD_BYTES};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use winfifo_common::consts::{CHECKSUM_MODULUS, WORD_MODULUS};
use winfifo_shared_memory::platform::pin_to_cpu;
use winfifo_shared_memory::{Channel, ChannelStats, FifoResult, Window, WindowConfig};

const WORD: usize = WORD_BYTES as usize;

/// Reader-side fold of the stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Checksum {
    /// Wrapping sum of `word % CHECKSUM_MODULUS`
    pub sum: u32,
    /// XOR of all words
    pub xor: u32,
}

impl Checksum {
    #[inline(always)]
    fn fold(&mut self, word: u32) {
        self.sum = self.sum.wrapping_add(word % CHECKSUM_MODULUS);
        self.xor ^= word;
    }

    /// Checksum of the first `words` words of the benchmark sequence
    pub fn expected(words: u64) -> Self {
        let mut checksum = Self::default();
        for index in 0..words {
            checksum.fold(word_at(index));
        }
        checksum
    }
}

#[inline(always)]
fn word_at(index: u64) -> u32 {
    (index % u64::from(WORD_MODULUS)) as u32
}

/// Outcome of one benchmark run
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    /// Words pushed through the ring
    pub words: u64,
    /// Ring capacity in bytes
    pub capacity: u32,
    /// Wall time from thread start to reader completion
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
    /// What the reader computed
    pub checksum: Checksum,
    /// What the reader should have computed
    pub expected: Checksum,
    /// Channel counters at the end of the run
    pub stats: ChannelStats,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl BenchReport {
    /// True if the reader saw exactly the produced sequence
    pub fn is_consistent(&self) -> bool {
        self.checksum == self.expected
    }

    /// Payload throughput in MiB/s
    pub fn mib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.words * WORD as u64) as f64 / secs / (1024.0 * 1024.0)
    }
}

/// Run the benchmark described by `config` on a fresh anonymous channel
pub fn run_bench(config: &BenchConfig) -> FifoResult<BenchReport> {
    config.validate()?;
    let channel = Channel::with_config(&config.channel)?;
    info!(
        words = config.bench.words,
        capacity = channel.capacity(),
        backend = ?channel.wake_backend(),
        "starting benchmark"
    );
    run_on(&channel, config)
}

/// Run the benchmark on an existing channel with no windows attached
pub fn run_on(channel: &Channel, config: &BenchConfig) -> FifoResult<BenchReport> {
    let words = config.bench.words;
    let mut writer = Window::writer(channel, config.writer)?;
    let mut reader = Window::reader(channel, config.reader)?;

    let started = Instant::now();
    let checksum = thread::scope(|s| -> FifoResult<Checksum> {
        let writer_cpu = config.bench.writer_cpu;
        let writer_batch = config.bench.writer_batch_words;
        let writer_thread = thread::Builder::new()
            .name("winfifo-writer".to_string())
            .spawn_scoped(s, move || -> FifoResult<()> {
                if let Some(cpu) = writer_cpu {
                    pin_to_cpu(cpu)?;
                }
                debug!(cpu = ?writer_cpu, "writer started");
                produce(&mut writer, words, writer_batch)
            })?;

        let reader_cpu = config.bench.reader_cpu;
        let reader_batch = config.bench.reader_batch_words;
        let reader_thread = thread::Builder::new()
            .name("winfifo-reader".to_string())
            .spawn_scoped(s, move || -> FifoResult<Checksum> {
                if let Some(cpu) = reader_cpu {
                    pin_to_cpu(cpu)?;
                }
                debug!(cpu = ?reader_cpu, "reader started");
                consume(&mut reader, words, reader_batch)
            })?;

        let checksum = join(reader_thread)?;
        join(writer_thread)?;
        Ok(checksum)
    })?;
    let elapsed = started.elapsed();

    Ok(BenchReport {
        words,
        capacity: channel.capacity(),
        elapsed,
        checksum,
        expected: Checksum::expected(words),
        stats: channel.stats(),
    })
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Publish whatever the window ate without blocking on the other side
fn finish(window: &mut Window<'_>) -> FifoResult<()> {
    window.set_policy(WindowConfig {
        min_batch: 0,
        ..window.policy()
    })?;
    window.exchange();
    Ok(())
}

fn produce(window: &mut Window<'_>, words: u64, batch: usize) -> FifoResult<()> {
    let mut index = 0u64;
    while index < words {
        window.exchange();
        if window.len() < WORD_BYTES {
            window.wait();
            continue;
        }

        let span = window.peek_bytes_mut();
        let remaining = usize::try_from(words - index).unwrap_or(usize::MAX);
        let n = (span.len() / WORD).min(batch).min(remaining);
        for chunk in span[..n * WORD].chunks_exact_mut(WORD) {
            chunk.copy_from_slice(&word_at(index).to_ne_bytes());
            index += 1;
        }
        window.eat_span(n * WORD);
    }
    finish(window)?;
    debug!(words, "writer finished");
    Ok(())
}

fn consume(window: &mut Window<'_>, words: u64, batch: usize) -> FifoResult<Checksum> {
    let mut checksum = Checksum::default();
    let mut seen = 0u64;
    while seen < words {
        window.exchange();
        if window.len() < WORD_BYTES {
            window.wait();
            continue;
        }

        let span = window.peek_bytes();
        let n = (span.len() / WORD).min(batch);
        for chunk in span[..n * WORD].chunks_exact(WORD) {
            checksum.fold(u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        seen += n as u64;
        window.eat_span(n * WORD);
    }
    finish(window)?;
    debug!(words, "reader finished");
    Ok(checksum)
}
