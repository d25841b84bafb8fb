//! Layered error definitions
//!
//! Categorized by source: config / topic / conversion / storage

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Converter implementation not registered
    #[error("unknown converter implementation '{implementation}' for converter '{converter}'")]
    UnknownImplementation {
        converter: String,
        implementation: String,
    },

    // ===== Topic Errors =====
    /// Topic pattern syntax error
    #[error("invalid topic pattern '{pattern}': {message}")]
    InvalidTopicPattern { pattern: String, message: String },

    // ===== Conversion Errors =====
    /// Payload could not be converted
    #[error("conversion error on topic '{topic}': {message}")]
    Conversion { topic: String, message: String },

    // ===== Storage Errors =====
    /// Storage write error
    #[error("storage target '{target}' write error: {message}")]
    StorageWrite { target: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create unknown implementation error
    pub fn unknown_implementation(
        converter: impl Into<String>,
        implementation: impl Into<String>,
    ) -> Self {
        Self::UnknownImplementation {
            converter: converter.into(),
            implementation: implementation.into(),
        }
    }

    /// Create topic pattern error
    pub fn invalid_topic_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTopicPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create conversion error
    pub fn conversion(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create storage write error
    pub fn storage_write(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageWrite {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Whether this error is fatal at startup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. }
                | Self::ConfigValidation { .. }
                | Self::UnknownImplementation { .. }
                | Self::InvalidTopicPattern { .. }
        )
    }
}
