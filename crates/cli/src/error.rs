//! Error types for CLI operations.

use fanout::FanoutError;
use ingestion::IngestionError;
use routing::RoutingError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Converter wiring failed
    #[error("Failed to build subscriptions: {0}")]
    Routing(#[from] RoutingError),

    /// Storage targets could not be created
    #[error("Failed to create storage targets: {0}")]
    Fanout(#[from] FanoutError),

    /// Bus sources could not be set up
    #[error("Failed to set up bus connections: {0}")]
    Ingestion(#[from] IngestionError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
