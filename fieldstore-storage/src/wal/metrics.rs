//! Block-flush counters, exposed for callers that want visibility into WAL
//! behavior without hooking the log itself. Plain atomics rather than a
//! metrics-registry crate, since there's exactly one `Wal` per data file and
//! no aggregation across instances is needed.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct WalMetrics {
    max_fill: AtomicU64,
    total_block_count: AtomicU64,
    total_size_written: AtomicU64,
}

impl WalMetrics {
    pub(crate) fn record_block_flush(&self, block_fill: u64) {
        self.total_block_count.fetch_add(1, Ordering::Relaxed);
        self.total_size_written
            .fetch_add(block_fill, Ordering::Relaxed);
        self.max_fill.fetch_max(block_fill, Ordering::Relaxed);
    }

    /// The largest number of bytes any single block has carried before being
    /// flushed (header, entries and padding included — i.e. its size just
    /// before the trailing checksum is written).
    pub fn max_fill(&self) -> u64 {
        self.max_fill.load(Ordering::Relaxed)
    }

    pub fn total_block_count(&self) -> u64 {
        self.total_block_count.load(Ordering::Relaxed)
    }

    pub fn total_size_written(&self) -> u64 {
        self.total_size_written.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_across_multiple_flushes() {
        let metrics = WalMetrics::default();
        metrics.record_block_flush(100);
        metrics.record_block_flush(250);

        assert_eq!(metrics.total_block_count(), 2);
        assert_eq!(metrics.total_size_written(), 350);
        assert_eq!(metrics.max_fill(), 250);
    }
}
