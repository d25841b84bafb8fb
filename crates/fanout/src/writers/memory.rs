//! MemoryWriter - records batches in memory
//!
//! Clones share the same record, so a test keeps one clone and hands the
//! other to a batch writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, Output, StorageWriter};
use parking_lot::Mutex;

#[derive(Default)]
struct Record {
    batches: Mutex<Vec<Vec<Output>>>,
    precisions: Mutex<Vec<Duration>>,
    closed: AtomicBool,
}

/// In-memory writer with optional latency and failure injection
#[derive(Clone)]
pub struct MemoryWriter {
    name: String,
    delay: Option<Duration>,
    fail: bool,
    record: Arc<Record>,
}

impl MemoryWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: None,
            fail: false,
            record: Arc::new(Record::default()),
        }
    }

    /// Every write takes `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every write fails
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Successfully written batches, in write order
    pub fn batches(&self) -> Vec<Vec<Output>> {
        self.record.batches.lock().clone()
    }

    /// All successfully written points
    pub fn points(&self) -> Vec<Output> {
        self.record.batches.lock().iter().flatten().cloned().collect()
    }

    /// Precision passed with each successful write
    pub fn precisions(&self) -> Vec<Duration> {
        self.record.precisions.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.record.closed.load(Ordering::Acquire)
    }
}

impl StorageWriter for MemoryWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, batch: &[Output], precision: Duration) -> Result<(), ContractError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ContractError::storage_write(&self.name, "injected failure"));
        }
        self.record.batches.lock().push(batch.to_vec());
        self.record.precisions.lock().push(precision);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.record.closed.store(true, Ordering::Release);
        Ok(())
    }
}
