//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::BridgeBlueprint;
use converters::ConverterRegistry;
use routing::SubscriptionIndex;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: u32,
    mqtt_clients: Vec<MqttClientInfo>,
    influx_db_clients: Vec<InfluxDbClientInfo>,
    converters: Vec<ConverterInfo>,
    implementations: Vec<&'static str>,
}

#[derive(Serialize)]
struct MqttClientInfo {
    name: String,
    broker: String,
    client_id: String,
    qos: u8,
    availability_topic: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    topics: Vec<String>,
}

#[derive(Serialize)]
struct InfluxDbClientInfo {
    name: String,
    address: String,
    database: String,
    writer: String,
    write_interval_ms: u128,
    time_precision_ms: u128,
}

#[derive(Serialize)]
struct ConverterInfo {
    name: String,
    implementation: String,
    mqtt_clients: Vec<String>,
    influx_db_clients: Vec<String>,
    mqtt_topics: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;
    let registry = ConverterRegistry::with_builtins();
    let index = if args.topics {
        let index = SubscriptionIndex::build(&blueprint, &registry)
            .context("Failed to build subscriptions")?;
        Some(index)
    } else {
        None
    };

    let info = build_config_info(&blueprint, &registry, index.as_ref());
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(
    blueprint: &BridgeBlueprint,
    registry: &ConverterRegistry,
    index: Option<&SubscriptionIndex>,
) -> ConfigInfo {
    let mqtt_clients = blueprint
        .mqtt_clients
        .values()
        .map(|c| MqttClientInfo {
            name: c.name.clone(),
            broker: c.broker.clone(),
            client_id: c.client_id.clone(),
            qos: c.qos,
            availability_topic: c.rendered_availability_topic(),
            topics: index
                .map(|i| i.topics_for(&c.name).into_iter().map(String::from).collect())
                .unwrap_or_default(),
        })
        .collect();

    let influx_db_clients = blueprint
        .influx_db_clients
        .values()
        .map(|c| InfluxDbClientInfo {
            name: c.name.clone(),
            address: c.address.clone(),
            database: c.database.clone(),
            writer: format!("{:?}", c.writer),
            write_interval_ms: c.write_interval.as_millis(),
            time_precision_ms: c.time_precision.as_millis(),
        })
        .collect();

    let converters = blueprint
        .converters
        .values()
        .map(|c| ConverterInfo {
            name: c.name.clone(),
            implementation: c.implementation.clone(),
            mqtt_clients: blueprint.mqtt_clients_for(c),
            influx_db_clients: blueprint.influx_db_clients_for(c),
            mqtt_topics: c.mqtt_topics.clone(),
        })
        .collect();

    ConfigInfo {
        version: blueprint.version,
        mqtt_clients,
        influx_db_clients,
        converters,
        implementations: registry.implementations(),
    }
}

fn tree_prefix(i: usize, len: usize) -> &'static str {
    if i + 1 == len {
        "└─"
    } else {
        "├─"
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               MQTT InfluxDB Bridge Configuration             ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 MQTT clients ({})", info.mqtt_clients.len());
    for (i, c) in info.mqtt_clients.iter().enumerate() {
        println!(
            "   {} {} ({}, client id {}, qos {})",
            tree_prefix(i, info.mqtt_clients.len()),
            c.name,
            c.broker,
            c.client_id,
            c.qos
        );
        println!("   │    availability: {}", c.availability_topic);
        for topic in &c.topics {
            println!("   │    subscribes: {}", topic);
        }
    }

    println!("\n🗄  InfluxDB clients ({})", info.influx_db_clients.len());
    for (i, c) in info.influx_db_clients.iter().enumerate() {
        println!(
            "   {} {} ({} -> {}/{}, every {} ms, precision {} ms)",
            tree_prefix(i, info.influx_db_clients.len()),
            c.name,
            c.writer,
            c.address,
            c.database,
            c.write_interval_ms,
            c.time_precision_ms
        );
    }

    println!("\n⚙️  Converters ({})", info.converters.len());
    for (i, c) in info.converters.iter().enumerate() {
        println!(
            "   {} {} ({}) {:?} -> {:?}",
            tree_prefix(i, info.converters.len()),
            c.name,
            c.implementation,
            c.mqtt_clients,
            c.influx_db_clients
        );
        for topic in &c.mqtt_topics {
            println!("   │    topic: {}", topic);
        }
    }

    println!("\nAvailable implementations: {}", info.implementations.join(", "));
    println!();
}
