//! Bridge orchestrator - wires registry, subscriptions, fan-out and bus.

use std::future::Future;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use config_loader::ConfigLoader;
use contracts::BridgeBlueprint;
use converters::ConverterRegistry;
use fanout::create_fanout;
use ingestion::{
    ChannelPublisher, ChannelSource, ConnectionOptions, IngestionPipeline, ReplayConfig,
    ReplayRecord, ReplaySource,
};
use routing::{Dispatcher, SubscriptionIndex};
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::error::Result;

/// Poll interval while waiting for finite sources
const FINISH_POLL: Duration = Duration::from_millis(50);

/// Where bus messages come from
#[derive(Debug, Clone)]
pub enum BusMode {
    /// JSONL recording, one replay source per connection
    Replay {
        path: PathBuf,
        speed: f64,
        loop_playback: bool,
    },
    /// JSONL records read from stdin until EOF
    Stdin,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The bridge configuration
    pub blueprint: BridgeBlueprint,

    /// Message source
    pub bus: BusMode,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Per-connection dispatch queue size
    pub buffer_size: usize,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until every source is exhausted, the timeout elapses or `shutdown` resolves
    ///
    /// Shutdown order: bus connections drain first, then every target gets a
    /// final flush.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if blueprint.log_config {
            log_config(blueprint);
        }

        let registry = ConverterRegistry::with_builtins();
        debug!(implementations = ?registry.implementations(), "converter registry ready");

        let index = Arc::new(SubscriptionIndex::build(blueprint, &registry)?);
        info!(
            converters = index.instances().len(),
            connections = blueprint.mqtt_clients.len(),
            "subscriptions built"
        );

        let fanout = create_fanout(blueprint)?;
        info!(targets = blueprint.influx_db_clients.len(), "storage targets started");

        let dispatcher = Dispatcher::new(Arc::clone(&index), fanout.router());
        let mut ingestion = IngestionPipeline::new(dispatcher);
        self.register_sources(&mut ingestion)?;

        ingestion.start_all();
        info!(bus = ?self.config.bus, "bridge running");

        let timeout = self.config.timeout;
        tokio::select! {
            _ = wait_finished(&ingestion) => {
                info!("all bus sources finished");
            }
            _ = tokio::time::sleep(timeout.unwrap_or_default()), if timeout.is_some() => {
                warn!(timeout_secs = timeout.unwrap_or_default().as_secs(), "bridge timed out");
            }
            _ = shutdown => {
                warn!("received shutdown signal, stopping bridge...");
            }
        }

        info!("shutting down bridge...");
        ingestion.shutdown().await;
        let targets = fanout.shutdown().await;

        let stats = PipelineStats::collect(
            start_time.elapsed(),
            &index,
            &ingestion.metrics(),
            &targets,
        );
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            messages = stats.report.messages_received,
            "bridge shutdown complete"
        );
        Ok(stats)
    }

    fn register_sources(&self, ingestion: &mut IngestionPipeline) -> Result<()> {
        let blueprint = &self.config.blueprint;
        let options_for = |name: &str| {
            let mut options = blueprint
                .mqtt_clients
                .get(name)
                .map(|client| ConnectionOptions::from_config(client, blueprint))
                .unwrap_or_default();
            options.channel_capacity = self.config.buffer_size;
            options
        };

        match &self.config.bus {
            BusMode::Replay {
                path,
                speed,
                loop_playback,
            } => {
                let replay_config = ReplayConfig {
                    speed_multiplier: *speed,
                    loop_playback: *loop_playback,
                };
                for name in blueprint.mqtt_clients.keys() {
                    let source = ReplaySource::load(path, name.as_str(), replay_config.clone())?;
                    ingestion.register_source(Box::new(source), options_for(name))?;
                }
            }
            BusMode::Stdin => {
                let mut publishers = Vec::new();
                for name in blueprint.mqtt_clients.keys() {
                    let (source, publisher) = ChannelSource::new(name.as_str());
                    ingestion.register_source(Box::new(source), options_for(name))?;
                    publishers.push(publisher);
                }
                std::thread::spawn(move || read_stdin(publishers));
            }
        }
        Ok(())
    }
}

async fn wait_finished(ingestion: &IngestionPipeline) {
    while !ingestion.all_finished() {
        tokio::time::sleep(FINISH_POLL).await;
    }
}

/// Forward JSONL records from stdin; publishers drop at EOF
fn read_stdin(publishers: Vec<ChannelPublisher>) {
    let stdin = std::io::stdin();
    for (idx, line) in stdin.lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = idx + 1, error = %e, "invalid message record on stdin");
                continue;
            }
        };
        if !forward(&publishers, &record) {
            break;
        }
    }
    debug!("stdin closed");
}

/// Publish on the named connection, or on all of them
///
/// Returns false once every connection is closed.
fn forward(publishers: &[ChannelPublisher], record: &ReplayRecord) -> bool {
    for publisher in publishers {
        if record
            .connection
            .as_deref()
            .is_some_and(|c| c != publisher.connection())
        {
            continue;
        }
        let payload = record.payload.clone().into_bytes();
        if let Err(e) = publisher.publish(record.topic.clone(), payload) {
            debug!(error = %e, "dropping stdin message");
        }
    }
    publishers.iter().any(|p| !p.is_closed())
}

/// Dump the effective configuration with credentials masked
fn log_config(blueprint: &BridgeBlueprint) {
    let redacted = ConfigLoader::redacted(blueprint);
    match ConfigLoader::to_json(&redacted) {
        Ok(json) => info!(config = %json, "effective configuration"),
        Err(e) => warn!(error = %e, "failed to serialize configuration"),
    }
}
