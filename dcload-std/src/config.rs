//! Host tool configuration file
//!
//! ```toml
//! host = "192.168.1.10:31313"
//! bind = "0.0.0.0"
//!
//! [client]
//! local_port = 31313
//! mount = "/pc"
//! ```
//!
//! Every key is optional; the `[client]` table takes the same fields as
//! [`ClientConfig`].

use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use dcload_core::ClientConfig;
use dcload_protocol::DCLOAD_PORT;
use serde::Deserialize;

/// Settings for the `dcl` tool
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Address the host tool listens on
    pub host: SocketAddrV4,
    /// Local address client sockets bind to
    pub bind: Ipv4Addr,
    /// Session settings
    pub client: ClientConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: SocketAddrV4::new(Ipv4Addr::LOCALHOST, DCLOAD_PORT),
            bind: Ipv4Addr::UNSPECIFIED,
            client: ClientConfig::default(),
        }
    }
}

impl HostConfig {
    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: HostConfig = toml::from_str(text).context("parse config")?;
        config
            .client
            .validate()
            .map_err(|e| anyhow!("invalid client settings: {:?}", e))?;
        Ok(config)
    }

    /// Load from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("load {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = HostConfig::from_toml("").unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.client.mount.as_str(), "/pc");
    }

    #[test]
    fn test_parse_overrides() {
        let config = HostConfig::from_toml(
            r#"
            host = "10.0.0.2:4000"

            [client]
            local_port = 0
            mount = "/host"
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "10.0.0.2:4000".parse().unwrap());
        assert_eq!(config.client.local_port, 0);
        assert_eq!(config.client.mount.as_str(), "/host");
        assert_eq!(config.client.console_name.as_str(), "fs_dclsocket");
    }

    #[test]
    fn test_invalid_mount_rejected() {
        let err = HostConfig::from_toml("[client]\nmount = \"pc\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid client settings"));
    }

    #[test]
    fn test_unparsable_host() {
        assert!(HostConfig::from_toml("host = \"nowhere\"").is_err());
    }
}
