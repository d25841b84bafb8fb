//! Bridge run statistics.

use std::time::Duration;

use fanout::BatchMetricsSnapshot;
use ingestion::MetricsSnapshot;
use observability::{ConverterStatsReport, ConverterStatsRow, TargetStatsRow};
use routing::SubscriptionIndex;

/// Statistics from a bridge run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Messages dropped because a dispatch queue was full
    pub messages_dropped: u64,

    /// Per-converter and per-target counts
    pub report: ConverterStatsReport,
}

impl PipelineStats {
    /// Gather final counts once the bus and every target are shut down
    pub fn collect(
        duration: Duration,
        index: &SubscriptionIndex,
        ingestion: &MetricsSnapshot,
        targets: &[(String, BatchMetricsSnapshot)],
    ) -> Self {
        let converters = index
            .instances()
            .iter()
            .map(|instance| {
                let snapshot = instance.stats().snapshot();
                ConverterStatsRow {
                    name: instance.name().to_string(),
                    implementation: instance.implementation().to_string(),
                    handled: snapshot.handled,
                    errors: snapshot.errors,
                }
            })
            .collect();

        let targets = targets
            .iter()
            .map(|(name, m)| TargetStatsRow {
                name: name.clone(),
                points_enqueued: m.enqueued,
                points_dropped: m.dropped,
                points_written: m.points_written,
                batches_written: m.batches_written,
                batches_failed: m.batches_failed,
                batch_size: m.batch_size.clone(),
            })
            .collect();

        Self {
            duration,
            messages_dropped: ingestion.messages_dropped,
            report: ConverterStatsReport {
                messages_received: ingestion.messages_received,
                converters,
                targets,
            },
        }
    }

    /// Messages per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.report.messages_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        print!("{}", self.report);
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Throughput: {:.2} msg/s", self.throughput());
        if self.messages_dropped > 0 {
            println!("Dropped (queue full): {}", self.messages_dropped);
        }
        println!();
    }
}
