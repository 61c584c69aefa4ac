//! Per-protocol adapter configuration.
//!
//! Every section has defaults matching a stock Debian/Ubuntu layout, so a
//! config file only has to override what differs on the host.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::protocols::CANONICAL_ORDER;
use vpsgate_common::{Error, Result};

/// Settings for every backend, keyed by protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Backends to provision, in saga order. `None` means all of them in
    /// canonical order.
    pub enabled: Option<Vec<String>>,
    pub ssh: SshConfig,
    pub xray: XrayConfig,
    pub websocket: WebSocketConfig,
    pub ssl: SslConfig,
    pub http: HttpConfig,
    pub squid: SquidConfig,
    pub udp: UdpConfig,
    pub dropbear: DropbearConfig,
}

impl ProtocolConfig {
    /// Backend names in the order the saga provisions them.
    pub fn backend_order(&self) -> Vec<String> {
        match &self.enabled {
            Some(names) => names.clone(),
            None => CANONICAL_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Check ports and the enabled list.
    ///
    /// # Errors
    /// - A port is zero
    /// - The enabled list is empty or names a backend twice
    pub fn validate(&self) -> Result<()> {
        let ports = [
            ("ssh", self.ssh.port),
            ("xray", self.xray.port),
            ("websocket", self.websocket.port),
            ("http", self.http.port),
            ("squid", self.squid.port),
            ("udp", self.udp.port),
            ("dropbear", self.dropbear.port),
        ];
        for (name, port) in ports {
            if port == 0 {
                return Err(Error::Config(format!("{}: port cannot be 0", name)));
            }
        }

        if let Some(enabled) = &self.enabled {
            if enabled.is_empty() {
                return Err(Error::Config(
                    "protocols.enabled cannot be empty".to_string(),
                ));
            }
            for (i, name) in enabled.iter().enumerate() {
                if enabled[..i].contains(name) {
                    return Err(Error::Config(format!(
                        "protocols.enabled lists '{}' twice",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub port: u16,
    /// Login shell for created accounts; tunnelling only, no shell access.
    pub shell: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: 22,
            shell: "/bin/false".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrayConfig {
    pub port: u16,
    pub config_path: PathBuf,
    /// systemd unit restarted after the client list changes.
    pub service: String,
}

impl Default for XrayConfig {
    fn default() -> Self {
        Self {
            port: 443,
            config_path: PathBuf::from("/etc/xray/config.json"),
            service: "xray".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    pub port: u16,
    pub config_dir: PathBuf,
    pub upstream: String,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            port: 8443,
            config_dir: PathBuf::from("/etc/nginx/conf.d"),
            upstream: "127.0.0.1:10000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    pub cert_dir: PathBuf,
    pub key_dir: PathBuf,
    pub validity_days: u32,
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            cert_dir: PathBuf::from("/etc/ssl/certs"),
            key_dir: PathBuf::from("/etc/ssl/private"),
            validity_days: 365,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub config_dir: PathBuf,
    pub htpasswd_path: PathBuf,
    pub upstream: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            config_dir: PathBuf::from("/etc/nginx/conf.d"),
            htpasswd_path: PathBuf::from("/etc/nginx/.htpasswd"),
            upstream: "127.0.0.1:10000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquidConfig {
    pub port: u16,
    pub passwd_file: PathBuf,
}

impl Default for SquidConfig {
    fn default() -> Self {
        Self {
            port: 3128,
            passwd_file: PathBuf::from("/etc/squid/passwd"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    pub port: u16,
    pub config_dir: PathBuf,
    pub timeout_secs: u32,
    pub buffer_size: u32,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            port: 7300,
            config_dir: PathBuf::from("/etc/udp"),
            timeout_secs: 300,
            buffer_size: 65535,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropbearConfig {
    pub port: u16,
    pub shell: String,
}

impl Default for DropbearConfig {
    fn default() -> Self {
        Self {
            port: 109,
            shell: "/bin/false".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: ProtocolConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProtocolConfig::default());
        assert_eq!(config.xray.config_path, PathBuf::from("/etc/xray/config.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: ProtocolConfig =
            serde_json::from_str(r#"{"squid": {"port": 8000}}"#).unwrap();
        assert_eq!(config.squid.port, 8000);
        assert_eq!(config.squid.passwd_file, PathBuf::from("/etc/squid/passwd"));
    }

    #[test]
    fn test_default_order_is_canonical() {
        let config = ProtocolConfig::default();
        assert_eq!(
            config.backend_order(),
            vec!["ssh", "xray", "ssl", "websocket", "http", "squid", "udp", "dropbear"]
        );
    }

    #[test]
    fn test_enabled_overrides_order() {
        let config: ProtocolConfig =
            serde_json::from_str(r#"{"enabled": ["squid", "ssh"]}"#).unwrap();
        assert_eq!(config.backend_order(), vec!["squid", "ssh"]);
    }

    #[test]
    fn test_validate_rejects_zero_port_and_duplicates() {
        let mut config = ProtocolConfig::default();
        config.udp.port = 0;
        assert!(config.validate().is_err());

        let config = ProtocolConfig {
            enabled: Some(vec!["ssh".to_string(), "ssh".to_string()]),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProtocolConfig {
            enabled: Some(Vec::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
