//! Fanout - builds one batch writer per storage target

use std::sync::Arc;

use contracts::{BridgeBlueprint, InfluxDbClientConfig, WriterKind};
use tracing::{info, instrument};

use crate::batch_writer::{BatchSettings, BatchWriterHandle};
use crate::error::FanoutError;
use crate::metrics::BatchMetricsSnapshot;
use crate::router::FanoutRouter;
use crate::writers::{FileWriter, HttpWriter, LogWriter};

/// Running batch writers plus the router feeding them
pub struct Fanout {
    router: Arc<FanoutRouter>,
    handles: Vec<BatchWriterHandle>,
}

impl Fanout {
    /// Create a fanout from already spawned batch writers (for testing)
    pub fn with_handles(handles: Vec<BatchWriterHandle>) -> Self {
        let router = Arc::new(FanoutRouter::new(handles.iter().map(|h| h.queue())));
        Self { router, handles }
    }

    /// Router to hand to the dispatcher
    pub fn router(&self) -> Arc<FanoutRouter> {
        Arc::clone(&self.router)
    }

    /// Get metrics for all targets
    pub fn metrics(&self) -> Vec<(String, BatchMetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Final flush of every target, then close the writers
    ///
    /// Returns the metrics of every target after the final flush.
    #[instrument(name = "fanout_shutdown", skip(self), fields(targets = self.handles.len()))]
    pub async fn shutdown(self) -> Vec<(String, BatchMetricsSnapshot)> {
        let mut metrics = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            let target_metrics = Arc::clone(handle.metrics());
            handle.shutdown().await;
            metrics.push((name, target_metrics.snapshot()));
        }
        info!("Fanout shutdown complete");
        metrics
    }
}

/// Spawn a batch writer for every `influx_db_clients` entry
///
/// Must be called inside a tokio runtime.
#[instrument(
    name = "fanout_create",
    skip(blueprint),
    fields(targets = blueprint.influx_db_clients.len())
)]
pub fn create_fanout(blueprint: &BridgeBlueprint) -> Result<Fanout, FanoutError> {
    let mut handles = Vec::with_capacity(blueprint.influx_db_clients.len());
    for config in blueprint.influx_db_clients.values() {
        handles.push(create_batch_writer(config, blueprint.log_worker_start)?);
    }
    Ok(Fanout::with_handles(handles))
}

#[instrument(
    name = "fanout_create_batch_writer",
    skip(config, log_start),
    fields(target_name = %config.name, writer = ?config.writer)
)]
fn create_batch_writer(
    config: &InfluxDbClientConfig,
    log_start: bool,
) -> Result<BatchWriterHandle, FanoutError> {
    let settings = BatchSettings::from_config(config);
    let handle = match config.writer {
        WriterKind::Log => BatchWriterHandle::spawn(LogWriter::new(&config.name), settings),
        WriterKind::File => {
            let writer = FileWriter::from_params(&config.name, &config.params)
                .map_err(|e| FanoutError::writer_creation(&config.name, e.to_string()))?;
            BatchWriterHandle::spawn(writer, settings)
        }
        WriterKind::Http => {
            let writer = HttpWriter::from_config(config)
                .map_err(|e| FanoutError::writer_creation(&config.name, e.to_string()))?;
            BatchWriterHandle::spawn(writer, settings)
        }
    };

    if log_start {
        info!(
            target_name = %config.name,
            address = %config.address,
            write_interval = ?config.write_interval,
            time_precision = ?config.time_precision,
            "batch writer started"
        );
    }
    Ok(handle)
}
