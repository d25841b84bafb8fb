//! 配置解析模块
//!
//! TOML 为主，JSON 为辅；两种格式共用同一套 serde 结构。

use std::path::Path;

use contracts::{BridgeBlueprint, ContractError};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 由扩展名 (不区分大小写) 推断
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// 由文件路径推断
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "{}: cannot determine config format without an extension",
                    path.display()
                ))
            })?;
        Self::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!(
                "{}: unsupported config format '.{ext}' (expected .toml or .json)",
                path.display()
            ))
        })
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// 解析配置内容，并用 map key 填充各项名称
pub fn parse(content: &str, format: ConfigFormat) -> Result<BridgeBlueprint, ContractError> {
    let parsed = match format {
        ConfigFormat::Toml => toml::from_str::<BridgeBlueprint>(content).map_err(boxed),
        ConfigFormat::Json => serde_json::from_str::<BridgeBlueprint>(content).map_err(boxed),
    };

    let mut blueprint = parsed.map_err(|source| ContractError::ConfigParse {
        message: format!("{} parse error: {source}", format.label()),
        source: Some(source),
    })?;
    blueprint.assign_names();
    Ok(blueprint)
}

fn boxed<E>(e: E) -> Box<dyn std::error::Error + Send + Sync>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(e)
}
