//! Fanout error types

use thiserror::Error;

/// Fanout-specific errors
#[derive(Debug, Error)]
pub enum FanoutError {
    /// Writer creation error
    #[error("failed to create writer for target '{name}': {message}")]
    WriterCreation { name: String, message: String },

    /// Storage write error (from contract)
    #[error("storage error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FanoutError {
    /// Create a writer creation error
    pub fn writer_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriterCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
