//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 回放文件读取失败
    #[error("failed to read replay file {path}: {source}")]
    ReplayRead {
        /// 文件路径
        path: String,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 回放记录解析失败
    #[error("invalid replay record at line {line}: {message}")]
    ReplayParse {
        /// 行号 (从 1 开始)
        line: usize,
        /// 错误消息
        message: String,
    },

    /// 连接已注册
    #[error("connection {connection} is already registered")]
    AlreadyRegistered {
        /// 连接名称
        connection: String,
    },

    /// 连接已关闭
    #[error("connection {connection} is closed")]
    ConnectionClosed {
        /// 连接名称
        connection: String,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
