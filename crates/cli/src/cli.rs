//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// MQTT InfluxDB Bridge - converts bus messages into time-series points
#[derive(Parser, Debug)]
#[command(
    name = "mqtt-influx-bridge",
    author,
    version,
    about = "MQTT to InfluxDB bridge",
    long_about = "Subscribes to MQTT topics, converts each message with the configured \n\
                  converters and writes the resulting points to InfluxDB in batches."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "BRIDGE_CONFIG")]
    pub config: PathBuf,

    /// Replay recorded messages (JSONL) instead of reading them from stdin
    #[arg(long, env = "BRIDGE_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Replay speed multiplier (1.0 = recorded pace, 0 = as fast as possible)
    #[arg(long, default_value = "1.0", value_parser = parse_replay_speed)]
    pub replay_speed: f64,

    /// Loop replay when finished
    #[arg(long)]
    pub replay_loop: bool,

    /// Bridge timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "BRIDGE_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running the bridge
    #[arg(long)]
    pub dry_run: bool,

    /// Per-connection dispatch queue size
    #[arg(long, default_value = "1024", env = "BRIDGE_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "BRIDGE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the topics each connection subscribes to
    #[arg(long)]
    pub topics: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Finite and non-negative
fn parse_replay_speed(raw: &str) -> Result<f64, String> {
    let speed: f64 = raw
        .parse()
        .map_err(|e| format!("invalid replay speed '{raw}': {e}"))?;
    if !speed.is_finite() || speed < 0.0 {
        return Err(format!("replay speed must be a finite number >= 0, got {raw}"));
    }
    Ok(speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::try_parse_from([
            "mqtt-influx-bridge",
            "--log-format",
            "json",
            "run",
            "--config",
            "bridge.toml",
            "--replay",
            "messages.jsonl",
            "--replay-speed",
            "0",
        ])
        .unwrap();

        assert!(matches!(cli.log_format, LogFormat::Json));
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("bridge.toml"));
        assert_eq!(args.replay, Some(PathBuf::from("messages.jsonl")));
        assert_eq!(args.replay_speed, 0.0);
        assert_eq!(args.buffer_size, 1024);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["mqtt-influx-bridge", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_replay_speed_rejects_bad_values() {
        for bad in ["-1", "NaN", "inf", "fast"] {
            let result = Cli::try_parse_from([
                "mqtt-influx-bridge",
                "run",
                &format!("--replay-speed={bad}"),
            ]);
            assert!(result.is_err(), "accepted {bad}");
        }
        assert_eq!(parse_replay_speed("2.5"), Ok(2.5));
    }
}
