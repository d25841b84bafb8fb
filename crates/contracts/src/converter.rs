//! Converter trait - pluggable payload conversion
//!
//! A converter turns one raw bus message into zero or more `Output` points.

use chrono::{DateTime, Utc};

use crate::{ContractError, ConverterConfig, Output};

/// Read-only view of a message handed to a converter
pub trait Input {
    /// Concrete topic the message arrived on
    fn topic(&self) -> &str;

    /// Raw payload bytes
    fn payload(&self) -> &[u8];

    /// Receive time (default output timestamp)
    fn received_at(&self) -> DateTime<Utc>;

    /// Topic segments matched by the wildcards of the subscription that selected
    /// this converter, in pattern order
    fn wildcards(&self) -> &[&str];
}

/// Conversion capability
///
/// Implementations must be stateless with respect to messages: the same input
/// always yields the same outputs, and a single instance is invoked concurrently
/// from every bus connection.
///
/// # Contract
///
/// - `convert` is synchronous and must not perform I/O
/// - every emitted `Output` has a timestamp and populated tag/field maps
/// - a malformed payload is reported by returning an error, never by panicking
pub trait Converter: Send + Sync {
    /// Registry name of this implementation (e.g. `float-to-field`)
    fn implementation(&self) -> &'static str;

    /// Measurement used when neither the converter config nor the output sets one
    fn default_measurement(&self) -> &'static str;

    /// Convert one input, calling `emit` once per produced point
    ///
    /// # Errors
    /// Returns `ContractError::Conversion` for payloads this converter cannot handle.
    fn convert(
        &self,
        config: &ConverterConfig,
        input: &dyn Input,
        emit: &mut dyn FnMut(Output),
    ) -> Result<(), ContractError>;
}
