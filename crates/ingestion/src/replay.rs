//! Replay source - 从 JSONL 录制文件回放总线消息
//!
//! 每行一条记录：
//!
//! ```text
//! {"connection": "c1", "topic": "sensors/kitchen/temp", "payload": "21.5", "offset_ms": 0}
//! ```
//!
//! `connection` 缺省时发送到所有连接；`offset_ms` 为相对录制开始的偏移。
//! 空行与 `#` 开头的行被忽略。

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{BusSource, Message, MessageCallback};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};

/// Replay 配置
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// 回放速度倍率 (1.0 = 原速, <= 0 表示不等待)
    ///
    /// 偏移按 `offset_ms / speed_multiplier` 换算；换算结果无法表示时该条记录不再发送。
    pub speed_multiplier: f64,
    /// 是否循环回放
    pub loop_playback: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            loop_playback: false,
        }
    }
}

/// 录制文件中的一条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// 目标连接 (None = 所有连接)
    #[serde(default)]
    pub connection: Option<String>,
    /// 具体 topic
    pub topic: String,
    /// UTF-8 payload
    pub payload: String,
    /// 相对录制开始的偏移 (毫秒)
    #[serde(default)]
    pub offset_ms: u64,
}

/// 解析 JSONL 录制内容
pub fn parse_records(content: &str) -> Result<Vec<ReplayRecord>> {
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: ReplayRecord =
            serde_json::from_str(line).map_err(|e| IngestionError::ReplayParse {
                line: idx + 1,
                message: e.to_string(),
            })?;
        records.push(record);
    }
    Ok(records)
}

/// Replay source - 按偏移回放一个连接的录制消息
pub struct ReplaySource {
    connection: String,
    records: Arc<Vec<ReplayRecord>>,
    config: ReplayConfig,
    listening: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReplaySource {
    /// 从录制文件加载 `connection` 的消息
    pub fn load(path: &Path, connection: impl Into<String>, config: ReplayConfig) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| IngestionError::ReplayRead {
            path: path.display().to_string(),
            source,
        })?;
        let records = parse_records(&content)?;
        let source = Self::from_records(connection, records, config);

        info!(
            connection = %source.connection,
            path = %path.display(),
            records = source.records.len(),
            "loaded replay source"
        );
        Ok(source)
    }

    /// 从内存记录构建，只保留属于 `connection` 的记录
    pub fn from_records(
        connection: impl Into<String>,
        records: Vec<ReplayRecord>,
        config: ReplayConfig,
    ) -> Self {
        let connection = connection.into();
        let mut records: Vec<ReplayRecord> = records
            .into_iter()
            .filter(|r| match &r.connection {
                Some(c) => *c == connection,
                None => true,
            })
            .collect();
        // 稳定排序，相同偏移保持文件顺序
        records.sort_by_key(|r| r.offset_ms);

        Self {
            connection,
            records: Arc::new(records),
            config,
            listening: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            thread_handle: Mutex::new(None),
        }
    }

    /// 记录条数
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否没有记录
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl BusSource for ReplaySource {
    fn connection_name(&self) -> &str {
        &self.connection
    }

    fn listen(&self, callback: MessageCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let listening = self.listening.clone();
        let finished = self.finished.clone();
        let records = self.records.clone();
        let connection = self.connection.clone();
        let speed = self.config.speed_multiplier;
        let loop_playback = self.config.loop_playback;

        let handle = thread::spawn(move || {
            let _guard = FinishOnPanic(finished.clone());
            debug!(connection = %connection, "replay thread started");

            loop {
                let start_time = Instant::now();

                for record in records.iter() {
                    match scaled_offset(record.offset_ms, speed)
                        .and_then(|offset| start_time.checked_add(offset))
                    {
                        Some(deadline) => wait_until(deadline, &listening),
                        None => {
                            warn!(
                                connection = %connection,
                                offset_ms = record.offset_ms,
                                speed,
                                "replay offset out of range at this speed, waiting for stop"
                            );
                            wait_for_stop(&listening);
                        }
                    }

                    if !listening.load(Ordering::Relaxed) {
                        debug!(connection = %connection, "replay stopped");
                        return;
                    }

                    callback(Message::new(
                        connection.clone(),
                        record.topic.clone(),
                        record.payload.clone().into_bytes(),
                    ));
                }

                if !loop_playback || records.is_empty() {
                    break;
                }
                debug!(connection = %connection, "replay looping");
            }

            finished.store(true, Ordering::SeqCst);
            info!(connection = %connection, "replay finished");
        });

        *self.thread_handle.lock() = Some(handle);
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.lock().take() {
            if handle.join().is_err() {
                warn!(connection = %self.connection, "replay thread panicked");
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// 按倍率换算录制偏移
///
/// 倍率 <= 0 (或 NaN) 不等待；换算结果超出 `Duration` 范围时返回 `None`。
fn scaled_offset(offset_ms: u64, speed: f64) -> Option<Duration> {
    if speed.is_nan() || speed <= 0.0 {
        return Some(Duration::ZERO);
    }
    Duration::try_from_secs_f64(offset_ms as f64 / 1000.0 / speed).ok()
}

/// 回放线程 panic 时仍标记结束，避免等待方挂起
struct FinishOnPanic(Arc<AtomicBool>);

impl Drop for FinishOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

fn wait_for_stop(listening: &AtomicBool) {
    while listening.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(50));
    }
}

/// 分段睡眠，停止时尽快返回
fn wait_until(deadline: Instant, listening: &AtomicBool) {
    const STEP: Duration = Duration::from_millis(50);
    while listening.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(STEP));
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
    }
}
