//! LogWriter - logs batches as line protocol via tracing

use std::time::Duration;

use contracts::{ContractError, Output, StorageWriter};
use tracing::{info, instrument};

use crate::line_protocol::encode_line;

/// Writer that logs every point, for dry runs
pub struct LogWriter {
    name: String,
}

impl LogWriter {
    /// Create a new LogWriter with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl StorageWriter for LogWriter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_writer_write",
        skip(self, batch),
        fields(target_name = %self.name, points = batch.len())
    )]
    async fn write(&mut self, batch: &[Output], precision: Duration) -> Result<(), ContractError> {
        for line in batch.iter().filter_map(|o| encode_line(o, precision)) {
            info!(target_name = %self.name, line = %line, "point");
        }
        Ok(())
    }

    #[instrument(name = "log_writer_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(target_name = %self.name, "LogWriter closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_log_writer_write() {
        let mut writer = LogWriter::new("test_log");
        let batch = vec![Output::new("m", Utc::now()).with_field("v", 1.0)];

        assert!(writer.write(&batch, Duration::from_secs(1)).await.is_ok());
        assert!(writer.close().await.is_ok());
    }
}
