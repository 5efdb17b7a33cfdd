use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every pipeline task.
#[derive(Debug, Default)]
pub struct PipelineStats {
    lines_read: AtomicU64,
    records_parsed: AtomicU64,
    lines_rejected: AtomicU64,
    records_written: AtomicU64,
    batches_written: AtomicU64,
    batches_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lines_read: u64,
    pub records_parsed: u64,
    pub lines_rejected: u64,
    pub records_written: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
}

impl PipelineStats {
    pub fn record_line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parsed(&self) {
        self.records_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.lines_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_written(&self, records: usize) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.records_written
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            lines_rejected: self.lines_rejected.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
        }
    }
}
