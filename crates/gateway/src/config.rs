use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use common::config::GatewayConfig;

pub const CONFIG_FILE_NAME: &str = "treegate.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// address for the http server to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// default log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 9000)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            gateway: GatewayConfig::default(),
            allocation: AllocationConfig::default(),
        }
    }
}

/// Where the allocation tree lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationConfig {
    /// Volatile tree, lost on shutdown
    #[default]
    Memory,
    /// Tree rooted at a directory on disk
    Local { path: PathBuf },
}

impl AppConfig {
    /// Default config location: ~/.config/treegate/treegate.toml
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("treegate").join(CONFIG_FILE_NAME))
    }

    /// Pick the config file to read: `path` if given (it must exist), else the
    /// default location if present. `None` means built-in defaults.
    pub fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
        match path {
            Some(path) if !path.exists() => Err(ConfigError::MissingFile(path.to_path_buf())),
            Some(path) => Ok(Some(path.to_path_buf())),
            None => Ok(Self::default_path().filter(|p| p.exists())),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_toml = fs::read_to_string(path)?;
        Ok(toml::from_str(&config_toml)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    TomlDe(#[from] toml::de::Error),
}
