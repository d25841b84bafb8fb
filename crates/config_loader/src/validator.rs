//! 配置校验模块
//!
//! 校验规则：
//! - version == 0
//! - mqtt_clients / influx_db_clients / converters 至少各一个
//! - broker / address 必填
//! - qos ∈ {0, 1, 2}
//! - write_interval / time_precision > 0
//! - 转换器 implementation 非空、topic 至少一个且语法合法
//! - 转换器引用的连接与目标必须存在

use contracts::{BridgeBlueprint, ContractError, TopicPattern, CONFIG_VERSION};

/// 校验 BridgeBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    validate_version(blueprint)?;
    validate_collections(blueprint)?;
    validate_mqtt_clients(blueprint)?;
    validate_influx_db_clients(blueprint)?;
    validate_converters(blueprint)?;
    Ok(())
}

/// 校验配置版本
fn validate_version(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    if blueprint.version != CONFIG_VERSION {
        return Err(ContractError::config_validation(
            "version",
            format!(
                "unsupported version {}, expected {}",
                blueprint.version, CONFIG_VERSION
            ),
        ));
    }
    Ok(())
}

/// 校验必填集合非空
fn validate_collections(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    let collections = [
        ("mqtt_clients", blueprint.mqtt_clients.is_empty()),
        ("influx_db_clients", blueprint.influx_db_clients.is_empty()),
        ("converters", blueprint.converters.is_empty()),
    ];
    for (field, empty) in collections {
        if empty {
            return Err(ContractError::config_validation(
                field,
                "at least one entry must be defined",
            ));
        }
    }
    Ok(())
}

/// 校验 MQTT 连接
fn validate_mqtt_clients(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    for (name, client) in &blueprint.mqtt_clients {
        if client.broker.is_empty() {
            return Err(ContractError::config_validation(
                format!("mqtt_clients[{name}].broker"),
                "broker cannot be empty",
            ));
        }
        if client.qos > 2 {
            return Err(ContractError::config_validation(
                format!("mqtt_clients[{name}].qos"),
                format!("qos must be 0, 1 or 2, got {}", client.qos),
            ));
        }
    }
    Ok(())
}

/// 校验 InfluxDB 目标
fn validate_influx_db_clients(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    for (name, client) in &blueprint.influx_db_clients {
        if client.address.is_empty() {
            return Err(ContractError::config_validation(
                format!("influx_db_clients[{name}].address"),
                "address cannot be empty",
            ));
        }
        if client.write_interval.is_zero() {
            return Err(ContractError::config_validation(
                format!("influx_db_clients[{name}].write_interval"),
                "write_interval must be > 0",
            ));
        }
        if client.time_precision.is_zero() {
            return Err(ContractError::config_validation(
                format!("influx_db_clients[{name}].time_precision"),
                "time_precision must be > 0",
            ));
        }
        if client.max_pending_points == 0 {
            return Err(ContractError::config_validation(
                format!("influx_db_clients[{name}].max_pending_points"),
                "max_pending_points must be > 0",
            ));
        }
    }
    Ok(())
}

/// 校验转换器
fn validate_converters(blueprint: &BridgeBlueprint) -> Result<(), ContractError> {
    for (name, converter) in &blueprint.converters {
        if converter.implementation.is_empty() {
            return Err(ContractError::config_validation(
                format!("converters[{name}].implementation"),
                "implementation cannot be empty",
            ));
        }
        if converter.mqtt_topics.is_empty() {
            return Err(ContractError::config_validation(
                format!("converters[{name}].mqtt_topics"),
                "at least one topic must be defined",
            ));
        }

        for client in &converter.mqtt_clients {
            if !blueprint.mqtt_clients.contains_key(client) {
                return Err(ContractError::config_validation(
                    format!("converters[{name}].mqtt_clients"),
                    format!("mqtt client '{client}' is not defined"),
                ));
            }
        }
        for client in &converter.influx_db_clients {
            if !blueprint.influx_db_clients.contains_key(client) {
                return Err(ContractError::config_validation(
                    format!("converters[{name}].influx_db_clients"),
                    format!("influx db client '{client}' is not defined"),
                ));
            }
        }

        // 占位符按每个参与连接分别展开后再校验
        for client_name in blueprint.mqtt_clients_for(converter) {
            let Some(client) = blueprint.mqtt_clients.get(&client_name) else {
                continue;
            };
            for topic in &converter.mqtt_topics {
                TopicPattern::parse(client.render_topic(topic)).map_err(|e| {
                    ContractError::config_validation(
                        format!("converters[{name}].mqtt_topics"),
                        e.to_string(),
                    )
                })?;
            }
        }
    }
    Ok(())
}
