//! FileWriter - appends line protocol to a file

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use contracts::{ContractError, Output, StorageWriter};
use tracing::{debug, error, instrument};

use crate::line_protocol::encode_batch;

/// Configuration for FileWriter
#[derive(Debug, Clone)]
pub struct FileWriterConfig {
    /// Output file, appended to
    pub path: PathBuf,
}

impl FileWriterConfig {
    /// Create config from params map (`path`, default `./<name>.lp`)
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("./{name}.lp")));

        Self { path }
    }
}

/// Writer that appends each batch to a line protocol file
pub struct FileWriter {
    name: String,
    file: File,
}

impl FileWriter {
    /// Create a new FileWriter, creating parent directories as needed
    pub fn new(name: impl Into<String>, config: FileWriterConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            file,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let config = FileWriterConfig::from_params(&name, params);
        Self::new(name, config)
    }

    fn append(&mut self, batch: &[Output], precision: Duration) -> Result<(), ContractError> {
        let body = encode_batch(batch, precision);
        self.file
            .write_all(body.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| {
                error!(target_name = %self.name, error = %e, "Write failed");
                ContractError::storage_write(&self.name, e.to_string())
            })
    }
}

impl StorageWriter for FileWriter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_writer_write",
        skip(self, batch),
        fields(target_name = %self.name, points = batch.len())
    )]
    async fn write(&mut self, batch: &[Output], precision: Duration) -> Result<(), ContractError> {
        self.append(batch, precision)
    }

    #[instrument(name = "file_writer_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.file.sync_all()?;
        debug!(target_name = %self.name, "FileWriter closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_writer_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("db1.lp");
        let config = FileWriterConfig { path: path.clone() };

        let mut writer = FileWriter::new("db1", config).unwrap();
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let batch = vec![
            Output::new("temperature", time).with_tag("room", "kitchen").with_field("value", 21.5),
            Output::new("temperature", time).with_tag("room", "hall").with_field("value", 19.0),
        ];

        writer.write(&batch, Duration::from_secs(1)).await.unwrap();
        writer.write(&batch[..1], Duration::from_secs(1)).await.unwrap();
        writer.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "temperature,room=kitchen value=21.5 1704067200");
        assert_eq!(lines[1], "temperature,room=hall value=19 1704067200");
    }

    #[test]
    fn test_default_path() {
        let config = FileWriterConfig::from_params("db1", &HashMap::new());
        assert_eq!(config.path, PathBuf::from("./db1.lp"));
    }
}
