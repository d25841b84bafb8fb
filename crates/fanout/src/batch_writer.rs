//! BatchWriterHandle - per-target pending buffer with a timed flush worker

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{truncate_time, InfluxDbClientConfig, Output, StorageWriter};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::line_protocol::encode_batch;
use crate::metrics::BatchMetrics;

/// Batching behaviour of one storage target
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Target name
    pub name: String,
    /// Delay between the end of one write and the next flush
    pub write_interval: Duration,
    /// Timestamps are rounded down to a multiple of this
    pub time_precision: Duration,
    /// Pending points above this are dropped
    pub max_pending_points: usize,
    /// Log every flushed batch as line protocol
    pub log_line_protocol: bool,
}

impl BatchSettings {
    pub fn from_config(config: &InfluxDbClientConfig) -> Self {
        Self {
            name: config.name.clone(),
            write_interval: config.write_interval,
            time_precision: config.time_precision,
            max_pending_points: config.max_pending_points,
            log_line_protocol: config.log_line_protocol,
        }
    }
}

struct Shared {
    settings: BatchSettings,
    pending: Mutex<Vec<Output>>,
    metrics: Arc<BatchMetrics>,
}

/// Enqueue side of a batch writer, cheap to clone
#[derive(Clone)]
pub struct BatchQueue {
    shared: Arc<Shared>,
}

impl BatchQueue {
    fn new(settings: BatchSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings,
                pending: Mutex::new(Vec::new()),
                metrics: Arc::new(BatchMetrics::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.settings.name
    }

    /// Add a point to the next batch
    ///
    /// The timestamp is truncated to the target precision first. Returns false
    /// if the buffer is full and the point was dropped.
    pub fn enqueue(&self, output: Output) -> bool {
        let settings = &self.shared.settings;
        let output = Output {
            time: truncate_time(output.time, settings.time_precision),
            precision: Some(settings.time_precision),
            ..output
        };

        let depth = {
            let mut pending = self.shared.pending.lock();
            if pending.len() >= settings.max_pending_points {
                None
            } else {
                pending.push(output);
                Some(pending.len())
            }
        };

        match depth {
            Some(depth) => {
                self.shared.metrics.inc_enqueued();
                self.set_pending(depth);
                observability::record_points_enqueued(&settings.name, 1);
                true
            }
            None => {
                self.shared.metrics.inc_dropped();
                observability::record_points_dropped(&settings.name, 1);
                warn!(target_name = %settings.name, "pending buffer full, point dropped");
                false
            }
        }
    }

    /// Points waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    fn take_pending(&self) -> Vec<Output> {
        let batch = std::mem::take(&mut *self.shared.pending.lock());
        self.set_pending(0);
        batch
    }

    fn set_pending(&self, depth: usize) {
        self.shared.metrics.set_pending(depth);
        observability::record_pending_depth(&self.shared.settings.name, depth);
    }
}

/// Handle to a running batch writer
pub struct BatchWriterHandle {
    queue: BatchQueue,
    shutdown_tx: watch::Sender<bool>,
    worker_handle: JoinHandle<()>,
}

impl BatchWriterHandle {
    /// Spawn the flush worker for `writer`
    pub fn spawn<W: StorageWriter + Send + 'static>(writer: W, settings: BatchSettings) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queue = BatchQueue::new(settings);

        let worker_queue = queue.clone();
        let worker_handle = tokio::spawn(async move {
            flush_loop(writer, worker_queue, shutdown_rx).await;
        });

        Self {
            queue,
            shutdown_tx,
            worker_handle,
        }
    }

    /// Get target name
    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// Enqueue side, for the router
    pub fn queue(&self) -> BatchQueue {
        self.queue.clone()
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<BatchMetrics> {
        &self.queue.shared.metrics
    }

    /// Stop the timer, flush what is pending and close the writer
    #[instrument(name = "batch_writer_shutdown", skip(self), fields(target_name = %self.name()))]
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.worker_handle.await {
            error!(target_name = %self.queue.name(), error = ?e, "Worker task panicked");
        }
        debug!(target_name = %self.queue.name(), "BatchWriterHandle shutdown complete");
    }
}

/// Timer loop: sleep, swap the buffer out, write it; re-armed after every write
#[instrument(
    name = "batch_writer_flush_loop",
    skip(writer, queue, shutdown_rx),
    fields(target_name = %queue.name())
)]
async fn flush_loop<W: StorageWriter>(
    mut writer: W,
    queue: BatchQueue,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let interval = queue.shared.settings.write_interval;
    debug!(interval = ?interval, "Batch writer started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                flush(&mut writer, &queue).await;
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    // final flush
    flush(&mut writer, &queue).await;
    if let Err(e) = writer.close().await {
        error!(error = %e, "Close failed on shutdown");
    }
    debug!("Batch writer stopped");
}

async fn flush<W: StorageWriter>(writer: &mut W, queue: &BatchQueue) {
    let batch = queue.take_pending();
    if batch.is_empty() {
        return;
    }

    let settings = &queue.shared.settings;
    if settings.log_line_protocol {
        info!(
            target_name = %settings.name,
            lines = %encode_batch(&batch, settings.time_precision).trim_end(),
            "line protocol"
        );
    }

    let started = Instant::now();
    let result = writer.write(&batch, settings.time_precision).await;
    observability::record_write_latency_ms(&settings.name, started.elapsed().as_secs_f64() * 1000.0);
    observability::record_batch_written(&settings.name, batch.len(), result.is_ok());
    queue.shared.metrics.record_batch(batch.len(), result.is_ok());

    match result {
        Ok(()) => debug!(target_name = %settings.name, points = batch.len(), "batch written"),
        Err(e) => error!(
            target_name = %settings.name,
            points = batch.len(),
            error = %e,
            "batch write failed, batch dropped"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::MemoryWriter;
    use chrono::{TimeZone, Utc};
    use contracts::FieldValue;
    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use tokio::time::sleep;

    fn settings(interval_ms: u64, precision: Duration) -> BatchSettings {
        BatchSettings {
            name: "db1".into(),
            write_interval: Duration::from_millis(interval_ms),
            time_precision: precision,
            max_pending_points: 100,
            log_line_protocol: true,
        }
    }

    fn point(millis: i64, value: f64) -> Output {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Output::new("temperature", base + chrono::Duration::milliseconds(millis))
            .with_field("value", value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_outputs_collapse_to_precision() {
        let writer = MemoryWriter::new("db1");
        let handle = BatchWriterHandle::spawn(writer.clone(), settings(200, Duration::from_secs(1)));
        let queue = handle.queue();

        for (i, ms) in [0, 10, 20].into_iter().enumerate() {
            assert!(queue.enqueue(point(ms, i as f64)));
        }
        sleep(Duration::from_millis(250)).await;

        let batches = writer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        for output in &batches[0] {
            assert_eq!(output.time, expected);
            assert_eq!(output.precision, Some(Duration::from_secs(1)));
        }
        assert_eq!(writer.precisions(), vec![Duration::from_secs(1)]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_during_write_goes_to_next_batch() {
        let writer = MemoryWriter::new("db1").with_delay(Duration::from_millis(100));
        let handle = BatchWriterHandle::spawn(writer.clone(), settings(200, Duration::from_millis(1)));
        let queue = handle.queue();

        queue.enqueue(point(0, 1.0));
        // flush starts at 200ms and the write runs until 300ms
        sleep(Duration::from_millis(250)).await;
        queue.enqueue(point(1, 2.0));
        assert_eq!(queue.pending_len(), 1);

        sleep(Duration::from_millis(100)).await;
        let batches = writer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].fields["value"], FieldValue::Float(1.0));

        // timer re-armed at 300ms, next flush at 500ms
        sleep(Duration::from_millis(300)).await;
        let batches = writer.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1][0].fields["value"], FieldValue::Float(2.0));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_and_closes() {
        let writer = MemoryWriter::new("db1");
        let handle = BatchWriterHandle::spawn(writer.clone(), settings(60_000, Duration::from_secs(1)));

        handle.queue().enqueue(point(0, 1.0));
        handle.shutdown().await;

        assert_eq!(writer.batches().len(), 1);
        assert!(writer.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_dropped() {
        let writer = MemoryWriter::new("db1").failing();
        let handle = BatchWriterHandle::spawn(writer.clone(), settings(200, Duration::from_secs(1)));
        let metrics = Arc::clone(handle.metrics());

        handle.queue().enqueue(point(0, 1.0));
        sleep(Duration::from_millis(250)).await;
        sleep(Duration::from_millis(250)).await;

        let snap = metrics.snapshot();
        assert_eq!(snap.batches_failed, 1);
        assert_eq!(snap.points_written, 0);
        assert_eq!(snap.pending, 0);

        handle.shutdown().await;
        assert!(writer.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_buffer_drops_points() {
        let writer = MemoryWriter::new("db1");
        let mut s = settings(200, Duration::from_secs(1));
        s.max_pending_points = 2;
        let handle = BatchWriterHandle::spawn(writer.clone(), s);
        let queue = handle.queue();

        assert!(queue.enqueue(point(0, 1.0)));
        assert!(queue.enqueue(point(1, 2.0)));
        assert!(!queue.enqueue(point(2, 3.0)));

        let snap = handle.metrics().snapshot();
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.dropped, 1);

        handle.shutdown().await;
        assert_eq!(writer.batches()[0].len(), 2);
    }

    /// Records every gauge `set` as (name, value)
    #[derive(Default)]
    struct GaugeRecorder {
        sets: Arc<Mutex<Vec<(String, f64)>>>,
    }

    struct RecordedGauge {
        name: String,
        sets: Arc<Mutex<Vec<(String, f64)>>>,
    }

    impl GaugeFn for RecordedGauge {
        fn increment(&self, _: f64) {}
        fn decrement(&self, _: f64) {}
        fn set(&self, value: f64) {
            self.sets.lock().push((self.name.clone(), value));
        }
    }

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::from_arc(Arc::new(RecordedGauge {
                name: key.name().to_string(),
                sets: self.sets.clone(),
            }))
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_pending_depth_gauge_follows_buffer() {
        let recorder = GaugeRecorder::default();
        let queue = BatchQueue::new(settings(200, Duration::from_secs(1)));

        metrics::with_local_recorder(&recorder, || {
            queue.enqueue(point(0, 1.0));
            queue.enqueue(point(1, 2.0));
            assert_eq!(queue.take_pending().len(), 2);
        });

        let depths: Vec<f64> = recorder
            .sets
            .lock()
            .iter()
            .filter(|(name, _)| name == "mqtt_influx_bridge_pending_points")
            .map(|(_, value)| *value)
            .collect();
        assert_eq!(depths, vec![1.0, 2.0, 0.0]);
        assert_eq!(queue.shared.metrics.pending(), 0);
    }
}
