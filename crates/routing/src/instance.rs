//! Converter instance: one configured converter bound to its implementation

use std::sync::Arc;

use contracts::{Converter, ConverterConfig};

use crate::ConverterStats;

/// A configured converter, created once at startup and shared by every
/// connection it listens on. Only `stats` changes at runtime.
pub struct ConverterInstance {
    config: ConverterConfig,
    converter: Arc<dyn Converter>,
    targets: Vec<String>,
    measurement: String,
    stats: ConverterStats,
}

impl ConverterInstance {
    pub fn new(config: ConverterConfig, converter: Arc<dyn Converter>, targets: Vec<String>) -> Self {
        let measurement = config
            .target_measurement
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| converter.default_measurement().to_string());
        let stats = ConverterStats::new(config.log_handle_once);
        Self {
            config,
            converter,
            targets,
            measurement,
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn implementation(&self) -> &'static str {
        self.converter.implementation()
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }

    /// Storage targets this converter writes to
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Measurement used for outputs that leave theirs empty
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn stats(&self) -> &ConverterStats {
        &self.stats
    }
}

impl std::fmt::Debug for ConverterInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterInstance")
            .field("name", &self.config.name)
            .field("implementation", &self.implementation())
            .field("measurement", &self.measurement)
            .field("targets", &self.targets)
            .finish()
    }
}
