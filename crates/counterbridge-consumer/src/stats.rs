//! Consumer statistics.

use serde::Serialize;

/// Read-only view of the consumer's counters, taken at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Events parsed successfully since start.
    pub events_processed: u64,

    /// Completed flushes, including partial successes.
    pub flush_count: u64,

    /// Epoch milliseconds of the last completed flush.
    pub last_flush_at: Option<i64>,

    /// Events currently folded in the aggregator (taken at query time).
    pub pending_messages: usize,

    /// Cumulative mean of scopes per completed flush, rounded.
    pub avg_batch_size: u64,

    /// Runtime errors observed: failed reads, failed flushes, failed acks.
    pub error_count: u64,
}

/// Mutable counter state behind the consumer's stats lock.
#[derive(Debug, Default)]
pub(crate) struct StatsInner {
    pub events_processed: u64,
    pub flush_count: u64,
    pub last_flush_at: Option<i64>,
    pub avg_batch_size: u64,
    pub error_count: u64,
}

impl StatsInner {
    /// Account one completed flush of `batch_scopes` scopes at time `at`.
    ///
    /// The running average is a cumulative mean over completed flushes:
    /// `new = round((old * (n - 1) + batch_scopes) / n)`.
    pub fn record_flush(&mut self, batch_scopes: usize, at: i64) {
        self.flush_count += 1;
        self.last_flush_at = Some(at);
        let n = self.flush_count as f64;
        let prior = self.avg_batch_size as f64 * (n - 1.0);
        self.avg_batch_size = ((prior + batch_scopes as f64) / n).round() as u64;
    }

    pub fn snapshot(&self, pending_messages: usize) -> StatsSnapshot {
        StatsSnapshot {
            events_processed: self.events_processed,
            flush_count: self.flush_count,
            last_flush_at: self.last_flush_at,
            pending_messages,
            avg_batch_size: self.avg_batch_size,
            error_count: self.error_count,
        }
    }
}
