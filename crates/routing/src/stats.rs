//! Per-converter statistics and diagnostic dedup

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Point-in-time copy of a converter's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successful invocations
    pub handled: u64,
    /// Failed invocations (conversion errors and panics)
    pub errors: u64,
    /// Error diagnostics actually logged
    pub error_logs: u64,
}

/// Success / error counters shared by every connection invoking a converter.
///
/// Counters only ever increase. With `once_per_topic` enabled, the
/// `record_*` methods report `true` only the first time a topic is seen, so
/// callers log one diagnostic per topic while every event is still counted.
#[derive(Debug, Default)]
pub struct ConverterStats {
    once_per_topic: bool,
    handled: AtomicU64,
    errors: AtomicU64,
    error_logs: AtomicU64,
    handled_topics: Mutex<HashSet<String>>,
    error_topics: Mutex<HashSet<String>>,
}

impl ConverterStats {
    pub fn new(once_per_topic: bool) -> Self {
        Self {
            once_per_topic,
            ..Self::default()
        }
    }

    /// Count a successful invocation; returns whether to log it
    pub fn record_handled(&self, topic: &str) -> bool {
        self.handled.fetch_add(1, Ordering::Relaxed);
        self.should_log(&self.handled_topics, topic)
    }

    /// Count a failed invocation; returns whether to log it
    pub fn record_error(&self, topic: &str) -> bool {
        self.errors.fetch_add(1, Ordering::Relaxed);
        let log = self.should_log(&self.error_topics, topic);
        if log {
            self.error_logs.fetch_add(1, Ordering::Relaxed);
        }
        log
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            handled: self.handled.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            error_logs: self.error_logs.load(Ordering::Relaxed),
        }
    }

    fn should_log(&self, seen: &Mutex<HashSet<String>>, topic: &str) -> bool {
        if !self.once_per_topic {
            return true;
        }
        let mut seen = seen.lock();
        if seen.contains(topic) {
            false
        } else {
            seen.insert(topic.to_string());
            true
        }
    }
}
