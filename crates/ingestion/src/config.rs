//! Connection options and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::{BridgeBlueprint, MqttClientConfig};

/// Per-connection queueing and logging options
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Messages buffered between the bus and the dispatch worker
    pub channel_capacity: usize,

    /// Log every received message
    pub log_messages: bool,

    /// Debug-log bus plumbing (subscriptions, queue state)
    pub log_debug: bool,

    /// Info-log worker start
    pub log_start: bool,

    /// Rendered availability topic
    pub availability_topic: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            log_messages: false,
            log_debug: false,
            log_start: false,
            availability_topic: None,
        }
    }
}

impl ConnectionOptions {
    /// Options for one configured connection
    pub fn from_config(client: &MqttClientConfig, blueprint: &BridgeBlueprint) -> Self {
        Self {
            log_messages: client.log_messages,
            log_debug: blueprint.log_mqtt_debug,
            log_start: blueprint.log_worker_start,
            availability_topic: Some(client.rendered_availability_topic()),
            ..Default::default()
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total messages received from the bus
    pub messages_received: AtomicU64,

    /// Messages dropped because the queue was full
    pub messages_dropped: AtomicU64,

    /// Messages handed to the dispatcher
    pub messages_dispatched: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record message received
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record message dropped
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record message dispatched
    pub fn record_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total messages received from the bus
    pub messages_received: u64,

    /// Messages dropped because the queue was full
    pub messages_dropped: u64,

    /// Messages handed to the dispatcher
    pub messages_dispatched: u64,

    /// Current queue length
    pub queue_len: usize,
}
