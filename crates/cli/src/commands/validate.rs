//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BridgeBlueprint, WriterKind};
use converters::ConverterRegistry;
use routing::SubscriptionIndex;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: u32,
    mqtt_client_count: usize,
    influx_db_client_count: usize,
    converter_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.clone(),
        error: Some(error),
        warnings: None,
        summary: None,
    };

    let blueprint = match super::load_blueprint(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => return invalid(format!("{e:#}")),
    };

    // 实现名只有在注册表中才能解析
    if let Err(e) = SubscriptionIndex::build(&blueprint, &ConverterRegistry::with_builtins()) {
        return invalid(e.to_string());
    }

    let warnings = collect_warnings(&blueprint);
    ValidationResult {
        valid: true,
        config_path: config_path.clone(),
        error: None,
        warnings: (!warnings.is_empty()).then_some(warnings),
        summary: Some(ConfigSummary {
            version: blueprint.version,
            mqtt_client_count: blueprint.mqtt_clients.len(),
            influx_db_client_count: blueprint.influx_db_clients.len(),
            converter_count: blueprint.converters.len(),
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &BridgeBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    for name in blueprint.mqtt_clients.keys() {
        let used = blueprint
            .converters
            .values()
            .any(|c| blueprint.mqtt_clients_for(c).contains(name));
        if !used {
            warnings.push(format!("MQTT client '{name}' is not used by any converter"));
        }
    }

    for (name, client) in &blueprint.influx_db_clients {
        let used = blueprint
            .converters
            .values()
            .any(|c| blueprint.influx_db_clients_for(c).contains(name));
        if !used {
            warnings.push(format!(
                "InfluxDB client '{name}' is not targeted by any converter"
            ));
        }
        if client.writer == WriterKind::Log {
            warnings.push(format!(
                "InfluxDB client '{name}' only logs points (writer = \"log\")"
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  MQTT clients: {}", summary.mqtt_client_count);
            println!("  InfluxDB clients: {}", summary.influx_db_client_count);
            println!("  Converters: {}", summary.converter_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
