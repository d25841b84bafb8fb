//! Routing error types

use contracts::ContractError;
use thiserror::Error;

/// Routing specific error
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Converter listens on a connection that is not configured
    #[error("converter '{converter}' references unknown mqtt client '{connection}'")]
    UnknownConnection {
        converter: String,
        connection: String,
    },

    /// Converter writes to a target that is not configured
    #[error("converter '{converter}' references unknown influx db client '{target}'")]
    UnknownTarget { converter: String, target: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl RoutingError {
    /// Create unknown connection error
    pub fn unknown_connection(converter: impl Into<String>, connection: impl Into<String>) -> Self {
        Self::UnknownConnection {
            converter: converter.into(),
            connection: connection.into(),
        }
    }

    /// Create unknown target error
    pub fn unknown_target(converter: impl Into<String>, target: impl Into<String>) -> Self {
        Self::UnknownTarget {
            converter: converter.into(),
            target: target.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, RoutingError>;
