//! Ingestion Pipeline main entry

use std::collections::BTreeMap;

use contracts::BusSource;
use routing::Dispatcher;
use tracing::{debug, info, instrument};

use crate::config::{ConnectionOptions, MetricsSnapshot};
use crate::connection::BusConnection;
use crate::error::{IngestionError, Result};

/// Ingestion Pipeline
///
/// Owns one [`BusConnection`] per bus connection. Each connection dispatches
/// its own messages in arrival order; connections run independently.
pub struct IngestionPipeline {
    dispatcher: Dispatcher,
    connections: BTreeMap<String, BusConnection>,
}

impl IngestionPipeline {
    /// Create an empty pipeline dispatching through `dispatcher`
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            connections: BTreeMap::new(),
        }
    }

    /// Register a bus source
    ///
    /// # Errors
    /// A source for the same connection is already registered.
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source, options),
        fields(connection = %source.connection_name())
    )]
    pub fn register_source(
        &mut self,
        source: Box<dyn BusSource>,
        options: ConnectionOptions,
    ) -> Result<()> {
        let name = source.connection_name().to_string();
        if self.connections.contains_key(&name) {
            return Err(IngestionError::AlreadyRegistered { connection: name });
        }
        debug!(connection = %name, "registered bus source");
        self.connections
            .insert(name, BusConnection::new(source, options));
        Ok(())
    }

    /// Start all registered connections
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(count = self.connections.len(), "starting all bus connections");
        for connection in self.connections.values() {
            if !connection.is_listening() {
                connection.start(self.dispatcher.clone());
            }
        }
    }

    /// Stop listening on all connections; queued messages are still dispatched
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.connections.len(), "stopping all bus connections");
        for connection in self.connections.values() {
            connection.stop();
        }
    }

    /// Stop all connections and wait until their queues are drained
    #[instrument(name = "ingestion_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        for connection in self.connections.values() {
            connection.shutdown().await;
        }
        info!("all bus connections drained");
    }

    /// Whether every source has delivered all of its messages
    ///
    /// False for an empty pipeline and for any live connection.
    pub fn all_finished(&self) -> bool {
        !self.connections.is_empty() && self.connections.values().all(BusConnection::is_finished)
    }

    /// Metrics summed across connections
    pub fn metrics(&self) -> MetricsSnapshot {
        self.connections
            .values()
            .map(|c| c.metrics().snapshot())
            .fold(MetricsSnapshot::default(), |acc, s| MetricsSnapshot {
                messages_received: acc.messages_received + s.messages_received,
                messages_dropped: acc.messages_dropped + s.messages_dropped,
                messages_dispatched: acc.messages_dispatched + s.messages_dispatched,
                queue_len: acc.queue_len + s.queue_len,
            })
    }

    /// Get registered connection count
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get a registered connection
    pub fn connection(&self, name: &str) -> Option<&BusConnection> {
        self.connections.get(name)
    }

    /// Check if specified connection is listening
    pub fn is_connection_listening(&self, name: &str) -> bool {
        self.connections
            .get(name)
            .is_some_and(BusConnection::is_listening)
    }
}
