//! Per-channel diagnostic counters
//!
//! Counters are process-local atomics owned by the `Channel` value. Each
//! side only bumps its own line, so the two sides never contend on them.
//! They carry no correctness weight.

use crate::error::FifoResult;
use crate::window::Role;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
#[repr(align(64))]
struct SideCounters {
    exchanges: AtomicU64,
    wakes: AtomicU64,
    sleeps: AtomicU64,
}

impl SideCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Live counters, one cache line per role
#[derive(Debug, Default)]
pub struct StatsCounters {
    reader: SideCounters,
    writer: SideCounters,
}

impl StatsCounters {
    fn side(&self, role: Role) -> &SideCounters {
        match role {
            Role::Reader => &self.reader,
            Role::Writer => &self.writer,
        }
    }

    /// One exchange performed by `role`
    pub(crate) fn record_exchange(&self, role: Role) {
        SideCounters::bump(&self.side(role).exchanges);
    }

    /// One wake signal delivered to `role`
    pub(crate) fn record_wake(&self, role: Role) {
        SideCounters::bump(&self.side(role).wakes);
    }

    /// One sleep entered by `role`
    pub(crate) fn record_sleep(&self, role: Role) {
        SideCounters::bump(&self.side(role).sleeps);
    }

    /// Read all counters
    pub fn snapshot(&self) -> ChannelStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ChannelStats {
            reader_exchanges: load(&self.reader.exchanges),
            writer_exchanges: load(&self.writer.exchanges),
            reader_wakes: load(&self.reader.wakes),
            writer_wakes: load(&self.writer.wakes),
            reader_sleeps: load(&self.reader.sleeps),
            writer_sleeps: load(&self.writer.sleeps),
        }
    }
}

/// Point-in-time copy of the channel counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Exchanges performed by the reader
    pub reader_exchanges: u64,
    /// Exchanges performed by the writer
    pub writer_exchanges: u64,
    /// Wake signals sent to a sleeping reader
    pub reader_wakes: u64,
    /// Wake signals sent to a sleeping writer
    pub writer_wakes: u64,
    /// Times the reader went to sleep
    pub reader_sleeps: u64,
    /// Times the writer went to sleep
    pub writer_sleeps: u64,
}

impl ChannelStats {
    /// Wake signals sent in either direction
    pub fn total_wakes(&self) -> u64 {
        self.reader_wakes + self.writer_wakes
    }

    /// Serialize as a single-line JSON object
    pub fn to_json(&self) -> FifoResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_role() {
        let counters = StatsCounters::default();
        counters.record_exchange(Role::Reader);
        counters.record_exchange(Role::Reader);
        counters.record_exchange(Role::Writer);
        counters.record_wake(Role::Writer);
        counters.record_sleep(Role::Reader);

        let stats = counters.snapshot();
        assert_eq!(stats.reader_exchanges, 2);
        assert_eq!(stats.writer_exchanges, 1);
        assert_eq!(stats.reader_wakes, 0);
        assert_eq!(stats.writer_wakes, 1);
        assert_eq!(stats.reader_sleeps, 1);
        assert_eq!(stats.writer_sleeps, 0);
        assert_eq!(stats.total_wakes(), 1);
    }

    #[test]
    fn test_json_snapshot() {
        let stats = ChannelStats {
            reader_exchanges: 3,
            ..ChannelStats::default()
        };
        let json = stats.to_json().unwrap();
        assert!(json.contains("\"reader_exchanges\":3"));
        let back: ChannelStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
