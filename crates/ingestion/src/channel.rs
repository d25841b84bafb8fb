//! In-process bus source
//!
//! Lets embedders (and tests) publish messages straight into a connection
//! without a broker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use async_channel::{unbounded, Receiver, Sender};
use bytes::Bytes;
use contracts::{BusSource, Message, MessageCallback};
use tracing::debug;

use crate::error::{IngestionError, Result};

/// Publishing half of a [`ChannelSource`]
///
/// The source finishes once every publisher has been dropped and the
/// queued messages were delivered.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    connection: String,
    tx: Sender<Message>,
}

impl ChannelPublisher {
    /// Connection this publisher feeds
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Whether the source side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Publish `payload` on `topic`, stamped with the current time
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> Result<()> {
        self.send(Message::new(self.connection.clone(), topic, payload))
    }

    /// Publish a prepared message
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx
            .try_send(message)
            .map_err(|_| IngestionError::ConnectionClosed {
                connection: self.connection.clone(),
            })
    }
}

/// Bus source fed by [`ChannelPublisher`]s
pub struct ChannelSource {
    connection: String,
    rx: Receiver<Message>,
    listening: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl ChannelSource {
    /// Create a source for `connection` and its first publisher
    pub fn new(connection: impl Into<String>) -> (Self, ChannelPublisher) {
        let connection = connection.into();
        let (tx, rx) = unbounded();
        let source = Self {
            connection: connection.clone(),
            rx,
            listening: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        };
        (source, ChannelPublisher { connection, tx })
    }
}

impl BusSource for ChannelSource {
    fn connection_name(&self) -> &str {
        &self.connection
    }

    fn listen(&self, callback: MessageCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let rx = self.rx.clone();
        let listening = self.listening.clone();
        let finished = self.finished.clone();
        let connection = self.connection.clone();

        thread::spawn(move || {
            while let Ok(message) = rx.recv_blocking() {
                if !listening.load(Ordering::Relaxed) {
                    break;
                }
                callback(message);
            }
            finished.store(true, Ordering::SeqCst);
            debug!(connection = %connection, "channel source drained");
        });
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            self.rx.close();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn wait_finished(source: &ChannelSource) {
        for _ in 0..200 {
            if source.is_finished() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("source did not finish");
    }

    #[test]
    fn test_delivers_in_order_then_finishes() {
        let (source, publisher) = ChannelSource::new("c1");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        publisher.publish("a/b", "1").unwrap();
        publisher.publish("a/c", "2").unwrap();
        drop(publisher);

        source.listen(Arc::new(move |m: Message| sink.lock().push(m.topic)));
        wait_finished(&source);

        assert_eq!(*seen.lock(), vec!["a/b".to_string(), "a/c".to_string()]);
    }

    #[test]
    fn test_publish_after_stop_fails() {
        let (source, publisher) = ChannelSource::new("c1");
        source.listen(Arc::new(|_| {}));
        source.stop();

        let err = publisher.publish("a", "1").unwrap_err();
        assert!(matches!(err, IngestionError::ConnectionClosed { .. }));
        wait_finished(&source);
    }
}
