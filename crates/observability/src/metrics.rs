//! 桥接指标收集模块
//!
//! 消息接收、转换结果、批量写入相关的 counter / gauge / histogram，
//! 以及进程退出时打印的内存统计报告。

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

/// 批次大小 histogram 名称
pub const BATCH_SIZE: &str = "mqtt_influx_bridge_batch_size";

/// 写入耗时 histogram 名称
pub const WRITE_LATENCY_MS: &str = "mqtt_influx_bridge_write_latency_ms";

/// 注册指标描述 (Prometheus HELP 文本)
pub fn describe_metrics() {
    describe_counter!(
        "mqtt_influx_bridge_messages_received_total",
        Unit::Count,
        "Messages received per bus connection"
    );
    describe_counter!(
        "mqtt_influx_bridge_messages_unmatched_total",
        Unit::Count,
        "Messages no converter subscribed to"
    );
    describe_counter!(
        "mqtt_influx_bridge_conversions_total",
        Unit::Count,
        "Converter invocations by outcome"
    );
    describe_counter!(
        "mqtt_influx_bridge_points_enqueued_total",
        Unit::Count,
        "Points accepted into a target buffer"
    );
    describe_counter!(
        "mqtt_influx_bridge_points_dropped_total",
        Unit::Count,
        "Points dropped because a target buffer was full"
    );
    describe_counter!(
        "mqtt_influx_bridge_batches_total",
        Unit::Count,
        "Batch writes by outcome"
    );
    describe_histogram!(BATCH_SIZE, Unit::Count, "Points per batch write");
    describe_histogram!(
        WRITE_LATENCY_MS,
        Unit::Milliseconds,
        "Duration of one batch write"
    );
    describe_gauge!(
        "mqtt_influx_bridge_pending_points",
        Unit::Count,
        "Points waiting for the next batch"
    );
}

/// 记录 bus 消息接收
pub fn record_message_received(connection: &str) {
    counter!(
        "mqtt_influx_bridge_messages_received_total",
        "connection" => connection.to_string()
    )
    .increment(1);
}

/// 记录没有任何转换器订阅的消息
pub fn record_message_unmatched(connection: &str) {
    counter!(
        "mqtt_influx_bridge_messages_unmatched_total",
        "connection" => connection.to_string()
    )
    .increment(1);
}

/// 记录一次转换调用结果
pub fn record_conversion(converter: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "mqtt_influx_bridge_conversions_total",
        "converter" => converter.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录进入写入缓冲的点
pub fn record_points_enqueued(target: &str, count: usize) {
    counter!(
        "mqtt_influx_bridge_points_enqueued_total",
        "target" => target.to_string()
    )
    .increment(count as u64);
}

/// 记录因缓冲已满被丢弃的点
pub fn record_points_dropped(target: &str, count: usize) {
    counter!(
        "mqtt_influx_bridge_points_dropped_total",
        "target" => target.to_string()
    )
    .increment(count as u64);
}

/// 记录批次写入结果
pub fn record_batch_written(target: &str, size: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "mqtt_influx_bridge_batches_total",
        "target" => target.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        BATCH_SIZE,
        "target" => target.to_string()
    )
    .record(size as f64);
}

/// 记录写入耗时
pub fn record_write_latency_ms(target: &str, latency_ms: f64) {
    histogram!(
        WRITE_LATENCY_MS,
        "target" => target.to_string()
    )
    .record(latency_ms);
}

/// 记录待写入缓冲深度
pub fn record_pending_depth(target: &str, depth: usize) {
    gauge!(
        "mqtt_influx_bridge_pending_points",
        "target" => target.to_string()
    )
    .set(depth as f64);
}

/// 单个转换器的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterStatsRow {
    pub name: String,
    pub implementation: String,
    pub handled: u64,
    pub errors: u64,
}

impl ConverterStatsRow {
    /// 错误占比 (%)
    pub fn error_rate(&self) -> f64 {
        let total = self.handled + self.errors;
        if total == 0 {
            0.0
        } else {
            self.errors as f64 / total as f64 * 100.0
        }
    }
}

/// 单个写入目标的统计
#[derive(Debug, Clone, Default)]
pub struct TargetStatsRow {
    pub name: String,
    pub points_enqueued: u64,
    pub points_dropped: u64,
    pub points_written: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
    pub batch_size: StatsSummary,
}

/// 运行统计报告
///
/// 在内存中汇总各转换器与写入目标的计数，便于退出时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ConverterStatsReport {
    pub messages_received: u64,
    pub converters: Vec<ConverterStatsRow>,
    pub targets: Vec<TargetStatsRow>,
}

impl ConverterStatsReport {
    /// 创建空报告
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有转换器成功次数之和
    pub fn total_handled(&self) -> u64 {
        self.converters.iter().map(|c| c.handled).sum()
    }

    /// 所有转换器失败次数之和
    pub fn total_errors(&self) -> u64 {
        self.converters.iter().map(|c| c.errors).sum()
    }
}

impl std::fmt::Display for ConverterStatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Bridge Statistics ===")?;
        writeln!(f, "Messages received: {}", self.messages_received)?;
        writeln!(
            f,
            "Conversions: {} ok, {} failed",
            self.total_handled(),
            self.total_errors()
        )?;

        if !self.converters.is_empty() {
            writeln!(f, "Converters:")?;
            for c in &self.converters {
                writeln!(
                    f,
                    "  {} ({}): handled={}, errors={} ({:.2}%)",
                    c.name,
                    c.implementation,
                    c.handled,
                    c.errors,
                    c.error_rate()
                )?;
            }
        }

        if !self.targets.is_empty() {
            writeln!(f, "Targets:")?;
            for t in &self.targets {
                writeln!(
                    f,
                    "  {}: enqueued={}, written={}, dropped={}, batches={} ok / {} failed",
                    t.name,
                    t.points_enqueued,
                    t.points_written,
                    t.points_dropped,
                    t.batches_written,
                    t.batches_failed
                )?;
                writeln!(f, "    batch size: {}", t.batch_size)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.0}, max={:.0}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
