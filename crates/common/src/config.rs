use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Name of the bucket that aliases the allocation root
pub const DEFAULT_ROOT_BUCKET_NAME: &str = "root";

/// Gateway settings, built once at startup and handed to
/// [`AllocationGateway::new`](crate::gateway::AllocationGateway::new).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// bucket name presented for the allocation root
    #[serde(default = "default_root_bucket_name")]
    pub root_bucket_name: String,
    /// directory for staging reads, if not set then the
    ///  system temporary directory will be used
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

fn default_root_bucket_name() -> String {
    DEFAULT_ROOT_BUCKET_NAME.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            root_bucket_name: default_root_bucket_name(),
            staging_dir: None,
        }
    }
}

impl GatewayConfig {
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.root_bucket_name, "root");
        assert_eq!(config.staging_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_overrides() {
        let config: GatewayConfig = toml::from_str(
            r#"
            root_bucket_name = "alloc"
            staging_dir = "/var/tmp/staging"
            "#,
        )
        .unwrap();
        assert_eq!(config.root_bucket_name, "alloc");
        assert_eq!(config.staging_dir(), PathBuf::from("/var/tmp/staging"));
    }
}
