//! # Config Loader
//!
//! 读取桥接配置文件，得到已校验的 `BridgeBlueprint`。
//!
//! 流程：识别格式 → serde 反序列化 (默认值 + map key 命名) → 规则校验。
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("bridge.toml"))?;
//! println!("{} converters", blueprint.converters.len());
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod parser;
mod validator;

pub use contracts::BridgeBlueprint;
pub use parser::ConfigFormat;

use std::path::Path;

use contracts::ContractError;

/// 凭据在导出配置中的替换文本
pub const REDACTED: &str = "***";

/// 配置加载入口
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从文件加载，格式由扩展名 (.toml / .json) 决定
    pub fn load_from_path(path: &Path) -> Result<BridgeBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
            message: format!("cannot read {}: {e}", path.display()),
            source: Some(Box::new(e)),
        })?;
        Self::load_from_str(&content, format)
    }

    /// 从字符串加载
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<BridgeBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    pub fn to_toml(blueprint: &BridgeBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(blueprint: &BridgeBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// 复制一份蓝图，非空密码替换为 [`REDACTED`]
    pub fn redacted(blueprint: &BridgeBlueprint) -> BridgeBlueprint {
        let mut copy = blueprint.clone();
        let passwords = copy
            .mqtt_clients
            .values_mut()
            .map(|c| &mut c.password)
            .chain(copy.influx_db_clients.values_mut().map(|c| &mut c.password));
        for password in passwords {
            if !password.is_empty() {
                *password = REDACTED.to_string();
            }
        }
        copy
    }
}
