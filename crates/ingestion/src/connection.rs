//! 总线连接
//!
//! 将 `BusSource` 适配为带队列的连接：
//! 回调只负责入队，单个 worker 任务按到达顺序逐条调用 `Dispatcher`。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{BusSource, Message, MessageCallback};
use parking_lot::Mutex;
use routing::Dispatcher;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::{ConnectionOptions, IngestionMetrics};

/// 一个总线连接及其分发 worker
pub struct BusConnection {
    connection: String,
    source: Box<dyn BusSource>,
    options: ConnectionOptions,
    listening: Arc<AtomicBool>,
    metrics: Arc<IngestionMetrics>,
    tx: Mutex<Option<Sender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BusConnection {
    /// 创建连接 (尚未启动)
    pub fn new(source: Box<dyn BusSource>, options: ConnectionOptions) -> Self {
        Self {
            connection: source.connection_name().to_string(),
            source,
            options,
            listening: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(IngestionMetrics::new()),
            tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// 连接名称
    pub fn name(&self) -> &str {
        &self.connection
    }

    /// 连接指标
    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// 是否正在监听
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    /// 数据源是否已经交付完所有消息
    pub fn is_finished(&self) -> bool {
        self.source.is_finished()
    }

    /// 启动 worker 并开始监听
    ///
    /// 必须在 tokio runtime 内调用。重复调用无效果。
    pub fn start(&self, dispatcher: Dispatcher) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = bounded(self.options.channel_capacity.max(1));

        if self.options.log_debug {
            let topics = dispatcher.index().topics_for(&self.connection);
            debug!(connection = %self.connection, topics = ?topics, "subscribing");
        }
        if self.options.log_start {
            info!(
                connection = %self.connection,
                availability_topic = self.options.availability_topic.as_deref().unwrap_or(""),
                "bus worker started"
            );
        }

        let worker = tokio::spawn(run_worker(
            self.connection.clone(),
            rx,
            dispatcher,
            self.metrics.clone(),
        ));
        *self.worker.lock() = Some(worker);
        *self.tx.lock() = Some(tx.clone());

        let connection = self.connection.clone();
        let listening = self.listening.clone();
        let metrics = self.metrics.clone();
        let log_messages = self.options.log_messages;

        let callback: MessageCallback = Arc::new(move |message| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }

            metrics.record_received();
            observability::record_message_received(&connection);
            if log_messages {
                info!(
                    connection = %connection,
                    topic = %message.topic,
                    payload = %String::from_utf8_lossy(&message.payload),
                    "message received"
                );
            }
            send_message(&tx, message, &metrics, &connection);
        });

        self.source.listen(callback);
    }

    /// 停止监听；已入队的消息仍会被分发
    pub fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(connection = %self.connection, "stopping bus connection");
            self.source.stop();
        }
    }

    /// 停止监听并等待队列中的消息分发完毕
    pub async fn shutdown(&self) {
        self.stop();

        if let Some(tx) = self.tx.lock().take() {
            tx.close();
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(connection = %self.connection, error = %e, "bus worker panicked");
            }
        }
    }
}

/// 非阻塞入队，队列满时丢弃并计数
fn send_message(
    tx: &Sender<Message>,
    message: Message,
    metrics: &IngestionMetrics,
    connection: &str,
) {
    match tx.try_send(message) {
        Ok(()) => metrics.update_queue_len(tx.len()),
        Err(TrySendError::Full(message)) => {
            metrics.record_dropped();
            warn!(
                connection = %connection,
                topic = %message.topic,
                "dispatch queue full, message dropped"
            );
        }
        Err(TrySendError::Closed(_)) => {
            trace!(connection = %connection, "dispatch queue closed");
        }
    }
}

async fn run_worker(
    connection: String,
    rx: Receiver<Message>,
    dispatcher: Dispatcher,
    metrics: Arc<IngestionMetrics>,
) {
    while let Ok(message) = rx.recv().await {
        metrics.update_queue_len(rx.len());
        dispatcher.dispatch(&connection, &message);
        metrics.record_dispatched();
    }
    debug!(connection = %connection, "bus worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelSource;
    use crate::test_support::{dispatcher_for, RecordingRouter};

    #[tokio::test]
    async fn test_messages_dispatched_in_order() {
        let router = RecordingRouter::new();
        let dispatcher = dispatcher_for(router.clone());
        let (source, publisher) = ChannelSource::new("c1");
        let connection = BusConnection::new(Box::new(source), ConnectionOptions::default());

        connection.start(dispatcher);
        for value in ["1", "2", "3"] {
            publisher.publish("sensors/kitchen/temp", value).unwrap();
        }
        drop(publisher);

        // 等待数据源交付完毕后再关闭
        while !connection.is_finished() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        connection.shutdown().await;

        let values = router.values();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        let snapshot = connection.metrics().snapshot();
        assert_eq!(snapshot.messages_received, 3);
        assert_eq!(snapshot.messages_dispatched, 3);
        assert_eq!(snapshot.messages_dropped, 0);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let router = RecordingRouter::new();
        let dispatcher = dispatcher_for(router.clone());
        let (source, _publisher) = ChannelSource::new("c1");
        let connection = BusConnection::new(Box::new(source), ConnectionOptions::default());

        connection.start(dispatcher.clone());
        connection.start(dispatcher);
        assert!(connection.is_listening());

        connection.shutdown().await;
        assert!(!connection.is_listening());
    }

    #[test]
    fn test_full_queue_drops() {
        let (tx, _rx) = bounded(1);
        let metrics = IngestionMetrics::new();

        send_message(&tx, Message::new("c1", "a", "1"), &metrics, "c1");
        send_message(&tx, Message::new("c1", "a", "2"), &metrics, "c1");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_dropped, 1);
        assert_eq!(snapshot.queue_len, 1);
    }
}
