//! # Fanout
//!
//! 输出分发与批量写入模块。
//!
//! 负责：
//! - 将转换器输出复制到每个目标的批量写入器
//! - 按目标精度截断时间戳
//! - 定时批量写入 InfluxDB (line protocol)，失败的批次丢弃不重试
//! - 关闭时最后一次 flush

pub mod batch_writer;
pub mod error;
pub mod fanout;
pub mod line_protocol;
pub mod metrics;
pub mod router;
pub mod writers;

pub use batch_writer::{BatchQueue, BatchSettings, BatchWriterHandle};
pub use contracts::{Output, StorageWriter};
pub use error::FanoutError;
pub use fanout::{create_fanout, Fanout};
pub use metrics::{BatchMetrics, BatchMetricsSnapshot};
pub use router::FanoutRouter;
pub use writers::{FileWriter, HttpWriter, LogWriter, MemoryWriter};
