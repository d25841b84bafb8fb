//! BridgeBlueprint - Config Loader 输出
//!
//! 描述完整的桥接配置：MQTT 连接、InfluxDB 目标、转换器、日志开关。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// 支持的配置版本
pub const CONFIG_VERSION: u32 = 0;

/// 默认 MQTT client id / InfluxDB 数据库名
pub const DEFAULT_CLIENT_ID: &str = "mqtt-influx-bridge";

/// 默认可用性 topic 模板
pub const DEFAULT_AVAILABILITY_TOPIC: &str = "%Prefix%tele/%ClientId%/LWT";

/// 完整的桥接配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeBlueprint {
    /// 配置版本 (必须为 0)
    #[serde(default)]
    pub version: u32,

    /// MQTT 连接 (名称 -> 配置)，至少一个
    #[serde(default)]
    pub mqtt_clients: BTreeMap<String, MqttClientConfig>,

    /// InfluxDB 目标 (名称 -> 配置)，至少一个
    #[serde(default)]
    pub influx_db_clients: BTreeMap<String, InfluxDbClientConfig>,

    /// 转换器 (名称 -> 配置)，至少一个
    #[serde(default)]
    pub converters: BTreeMap<String, ConverterConfig>,

    /// 启动时输出生效配置
    #[serde(default)]
    pub log_config: bool,

    /// 输出 worker 启动日志
    #[serde(default)]
    pub log_worker_start: bool,

    /// 输出 MQTT 调试日志
    #[serde(default)]
    pub log_mqtt_debug: bool,
}

/// MQTT 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttClientConfig {
    /// 名称 (由 map key 自动填充)
    #[serde(skip)]
    pub name: String,

    /// Broker 地址 (必填), e.g. "tcp://localhost:1883"
    pub broker: String,

    /// 用户名
    #[serde(default)]
    pub user: String,

    /// 密码
    #[serde(default)]
    pub password: String,

    /// Client id
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// QoS 等级，只允许 0 / 1 / 2
    #[serde(default)]
    pub qos: u8,

    /// 可用性 topic 模板，支持 %Prefix% 与 %ClientId% 占位符
    #[serde(default = "default_availability_topic")]
    pub availability_topic: String,

    /// topic 前缀，替换转换器 topic 中的 %Prefix%
    #[serde(default)]
    pub topic_prefix: String,

    /// 输出每条收到的消息
    #[serde(default)]
    pub log_messages: bool,
}

impl MqttClientConfig {
    /// 替换模板中的 %Prefix% 与 %ClientId% 占位符
    pub fn render_topic(&self, template: &str) -> String {
        template
            .replace("%Prefix%", &self.topic_prefix)
            .replace("%ClientId%", &self.client_id)
    }

    /// 渲染后的可用性 topic
    pub fn rendered_availability_topic(&self) -> String {
        self.render_topic(&self.availability_topic)
    }
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_availability_topic() -> String {
    DEFAULT_AVAILABILITY_TOPIC.to_string()
}

/// InfluxDB 目标配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxDbClientConfig {
    /// 名称 (由 map key 自动填充)
    #[serde(skip)]
    pub name: String,

    /// 服务地址 (必填), e.g. "http://localhost:8086"
    pub address: String,

    /// 用户名
    #[serde(default)]
    pub user: String,

    /// 密码
    #[serde(default)]
    pub password: String,

    /// 数据库名
    #[serde(default = "default_database")]
    pub database: String,

    /// 批量写入间隔
    #[serde(default = "default_write_interval", with = "humantime_serde")]
    pub write_interval: Duration,

    /// 时间戳精度 (写入前向下取整)
    #[serde(default = "default_time_precision", with = "humantime_serde")]
    pub time_precision: Duration,

    /// 输出每个批次的 line protocol
    #[serde(default)]
    pub log_line_protocol: bool,

    /// 写入实现
    #[serde(default)]
    pub writer: WriterKind,

    /// 待写入点数上限，超出后丢弃新点
    #[serde(default = "default_max_pending_points")]
    pub max_pending_points: usize,

    /// 写入实现特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_database() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_write_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_time_precision() -> Duration {
    Duration::from_secs(1)
}

fn default_max_pending_points() -> usize {
    100_000
}

/// 写入实现类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterKind {
    /// InfluxDB HTTP 写入
    #[default]
    Http,
    /// 日志输出
    Log,
    /// 追加写入文件
    File,
}

/// 转换器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// 名称 (由 map key 自动填充)
    #[serde(skip)]
    pub name: String,

    /// 实现名称 (必填), e.g. "float-to-field"
    pub implementation: String,

    /// 目标 measurement，缺省时由实现决定
    #[serde(default)]
    pub target_measurement: Option<String>,

    /// 订阅的 topic 模式，至少一个
    #[serde(default)]
    pub mqtt_topics: Vec<String>,

    /// 参与的 MQTT 连接，空表示全部
    #[serde(default)]
    pub mqtt_clients: Vec<String>,

    /// 参与的 InfluxDB 目标，空表示全部
    #[serde(default)]
    pub influx_db_clients: Vec<String>,

    /// 每个 topic 只输出一次诊断日志
    #[serde(default)]
    pub log_handle_once: bool,

    /// 通配符捕获段对应的 tag 名 (按模式中通配符顺序)
    #[serde(default)]
    pub wildcard_tags: Vec<String>,

    /// 实现特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ConverterConfig {
    /// 读取实现参数
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl BridgeBlueprint {
    /// 用 map key 填充各配置的 name 字段
    pub fn assign_names(&mut self) {
        for (name, client) in &mut self.mqtt_clients {
            client.name.clone_from(name);
        }
        for (name, client) in &mut self.influx_db_clients {
            client.name.clone_from(name);
        }
        for (name, converter) in &mut self.converters {
            converter.name.clone_from(name);
        }
    }

    /// 转换器实际监听的 MQTT 连接 (空列表 = 全部)
    pub fn mqtt_clients_for(&self, converter: &ConverterConfig) -> Vec<String> {
        if converter.mqtt_clients.is_empty() {
            self.mqtt_clients.keys().cloned().collect()
        } else {
            converter.mqtt_clients.clone()
        }
    }

    /// 转换器实际写入的 InfluxDB 目标 (空列表 = 全部)
    pub fn influx_db_clients_for(&self, converter: &ConverterConfig) -> Vec<String> {
        if converter.influx_db_clients.is_empty() {
            self.influx_db_clients.keys().cloned().collect()
        } else {
            converter.influx_db_clients.clone()
        }
    }
}
