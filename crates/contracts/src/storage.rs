//! StorageWriter trait - batch writer output interface
//!
//! Defines the abstract interface for storage-write collaborators.

use std::time::Duration;

use crate::{ContractError, Output};

/// Storage write trait
///
/// All storage backends must implement this trait.
#[trait_variant::make(StorageWriter: Send)]
pub trait LocalStorageWriter {
    /// Target name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one batch, timestamps already truncated to `precision`
    ///
    /// # Errors
    /// Returns write error (should include context). The caller does not retry.
    async fn write(&mut self, batch: &[Output], precision: Duration) -> Result<(), ContractError>;

    /// Close the writer
    async fn close(&mut self) -> Result<(), ContractError>;
}
