//! HttpWriter - POSTs line protocol to the InfluxDB write endpoint

use std::time::Duration;

use contracts::{ContractError, InfluxDbClientConfig, Output, StorageWriter};
use tracing::{debug, instrument};

use crate::line_protocol::{encode_batch, precision_unit};

/// Default request timeout, overridable with the `timeout_ms` param
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Writer for the InfluxDB 1.x `/write` API
///
/// One request per batch, no retries.
pub struct HttpWriter {
    name: String,
    endpoint: String,
    database: String,
    user: String,
    password: String,
    client: reqwest::Client,
}

impl HttpWriter {
    /// Create a writer from target configuration
    pub fn from_config(config: &InfluxDbClientConfig) -> Result<Self, ContractError> {
        let timeout = config
            .params
            .get("timeout_ms")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContractError::storage_write(&config.name, e.to_string()))?;

        Ok(Self {
            name: config.name.clone(),
            endpoint: format!("{}/write", config.address.trim_end_matches('/')),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            client,
        })
    }

    /// Write endpoint, without query
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl StorageWriter for HttpWriter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_writer_write",
        skip(self, batch),
        fields(target_name = %self.name, points = batch.len())
    )]
    async fn write(&mut self, batch: &[Output], precision: Duration) -> Result<(), ContractError> {
        let body = encode_batch(batch, precision);
        if body.is_empty() {
            return Ok(());
        }
        let (unit, _) = precision_unit(precision);

        let mut request = self
            .client
            .post(&self.endpoint)
            .query(&[("db", self.database.as_str()), ("precision", unit)])
            .body(body);
        if !self.user.is_empty() {
            request = request.basic_auth(&self.user, Some(&self.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ContractError::storage_write(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ContractError::storage_write(
                &self.name,
                format!("server returned {status}: {}", detail.trim()),
            ));
        }

        debug!(target_name = %self.name, status = %status, "batch accepted");
        Ok(())
    }

    #[instrument(name = "http_writer_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(target_name = %self.name, "HttpWriter closed");
        Ok(())
    }
}
