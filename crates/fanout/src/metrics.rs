//! Batch writer metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use observability::{RunningStats, StatsSummary};
use parking_lot::Mutex;

/// Metrics for a single storage target
#[derive(Debug, Default)]
pub struct BatchMetrics {
    /// Points waiting for the next flush
    pending: AtomicUsize,
    /// Points accepted by enqueue
    enqueued: AtomicU64,
    /// Points rejected because the buffer was full
    dropped: AtomicU64,
    /// Points in successfully written batches
    points_written: AtomicU64,
    /// Successful batch writes
    batches_written: AtomicU64,
    /// Failed batch writes (batch discarded)
    batches_failed: AtomicU64,
    /// Batch size distribution
    batch_sizes: Mutex<RunningStats>,
}

impl BatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn set_pending(&self, len: usize) {
        self.pending.store(len, Ordering::Relaxed);
    }

    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch write outcome
    pub fn record_batch(&self, size: usize, success: bool) {
        if success {
            self.batches_written.fetch_add(1, Ordering::Relaxed);
            self.points_written.fetch_add(size as u64, Ordering::Relaxed);
        } else {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.batch_sizes.lock().push(size as f64);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> BatchMetricsSnapshot {
        BatchMetricsSnapshot {
            pending: self.pending(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            points_written: self.points_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            batch_size: StatsSummary::from(&*self.batch_sizes.lock()),
        }
    }
}

/// Snapshot of batch metrics (for reporting)
#[derive(Debug, Clone)]
pub struct BatchMetricsSnapshot {
    pub pending: usize,
    pub enqueued: u64,
    pub dropped: u64,
    pub points_written: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
    pub batch_size: StatsSummary,
}
