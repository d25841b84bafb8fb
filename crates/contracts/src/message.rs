//! Message - bus collaborator output
//!
//! One payload received on one concrete topic of one bus connection.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Raw bus message
///
/// Read-only once created; dropped after dispatch completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Name of the bus connection that received the message
    pub connection: String,

    /// Concrete topic (no wildcards)
    pub topic: String,

    /// Payload bytes (zero-copy)
    pub payload: Bytes,

    /// Receive time, the default timestamp for converted outputs
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(
        connection: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::received_at(connection, topic, payload, Utc::now())
    }

    /// Create a message with an explicit receive time
    pub fn received_at(
        connection: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            connection: connection.into(),
            topic: topic.into(),
            payload: payload.into(),
            received_at,
        }
    }

    /// Payload as UTF-8, if valid
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
