//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::pipeline::{BusMode, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let blueprint = load_blueprint(&args.config)?;

    info!(
        mqtt_clients = blueprint.mqtt_clients.len(),
        influx_db_clients = blueprint.influx_db_clients.len(),
        converters = blueprint.converters.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let bus = match &args.replay {
        Some(path) => BusMode::Replay {
            path: path.clone(),
            speed: args.replay_speed,
            loop_playback: args.replay_loop,
        },
        None => {
            info!("Reading message records from stdin");
            BusMode::Stdin
        }
    };

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        bus,
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
    });

    info!("Starting bridge...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Bridge execution failed")?;

    info!(
        messages = stats.report.messages_received,
        handled = stats.report.total_handled(),
        errors = stats.report.total_errors(),
        duration_secs = stats.duration.as_secs_f64(),
        "Bridge completed"
    );
    stats.print_summary();

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::BridgeBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("MQTT clients ({}):", blueprint.mqtt_clients.len());
    for client in blueprint.mqtt_clients.values() {
        println!("  - {} ({}, qos {})", client.name, client.broker, client.qos);
    }

    println!("\nInfluxDB clients ({}):", blueprint.influx_db_clients.len());
    for client in blueprint.influx_db_clients.values() {
        println!(
            "  - {} ({:?} -> {}/{})",
            client.name, client.writer, client.address, client.database
        );
    }

    println!("\nConverters ({}):", blueprint.converters.len());
    for converter in blueprint.converters.values() {
        println!(
            "  - {} ({}) topics: {:?}",
            converter.name, converter.implementation, converter.mqtt_topics
        );
    }

    println!();
}
