//! 服务端配置
//!
//! 从 TOML 文件加载，文件不存在时使用默认值；缺少的字段同样取默认值。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use protocol::NetworkConfig;

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "CHESS_SERVER_CONFIG";

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "chess-server.toml";

/// 默认日志过滤指令
pub const DEFAULT_LOG_DIRECTIVE: &str = "chess_server=info";

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// 配置文件不是合法的 TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// 服务端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub network: NetworkConfig,
    /// 附加到 RUST_LOG 之上的日志过滤指令
    pub log_directive: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            log_directive: DEFAULT_LOG_DIRECTIVE.to_string(),
        }
    }
}

impl ServerConfig {
    /// 从指定文件加载
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// 文件存在时加载，否则返回默认配置
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 配置文件路径：优先取环境变量
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        self.network.addr()
    }
}
