//! BusSource trait - bus connection abstraction
//!
//! Defines a unified interface for message sources, decoupling the pipeline from
//! concrete bus clients (replay files, in-process channels, broker clients).

use std::sync::Arc;

use crate::Message;

/// Message callback type
///
/// When a connection receives a message, it sends the `Message` through this callback.
pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Bus connection trait
///
/// # Contract
///
/// 1. Messages of one connection are delivered one at a time, in arrival order
/// 2. The source owns connect/reconnect/auth; the pipeline only sees messages
/// 3. Repeated `listen` calls are idempotent
pub trait BusSource: Send + Sync {
    /// Connection name (matches the `mqtt_clients` key)
    fn connection_name(&self) -> &str;

    /// Start delivering messages to `callback`
    fn listen(&self, callback: MessageCallback);

    /// Stop delivering messages
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;

    /// Whether the source has delivered everything it will ever deliver
    ///
    /// Live connections never finish; replay sources finish at end of file.
    fn is_finished(&self) -> bool {
        false
    }
}
