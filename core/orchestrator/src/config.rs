//! Manager configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vpsgate_backends::ProtocolConfig;
use vpsgate_common::{Error, Result};
use vpsgate_crypto::KdfParams;

/// Default per-step deadline for a backend call.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 120;

/// Default interval between periodic expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Top-level configuration, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Suffix for per-account virtual hosts (`<user>.<domain>`).
    pub domain: String,
    /// Optional audit log file.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Account registry file.
    pub db_path: PathBuf,
    /// Deadline for one backend call; 0 disables it.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub protocols: ProtocolConfig,
    /// Argon2id cost for credential digests.
    #[serde(default)]
    pub kdf: KdfParams,
}

fn default_step_timeout_secs() -> u64 {
    DEFAULT_STEP_TIMEOUT_SECS
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

impl ManagerConfig {
    /// Minimal configuration with every other setting at its default.
    pub fn new(domain: impl Into<String>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            domain: domain.into(),
            log_path: None,
            db_path: db_path.into(),
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            protocols: ProtocolConfig::default(),
            kdf: KdfParams::default(),
        }
    }

    /// Read and validate the configuration at `path`.
    ///
    /// # Errors
    /// - The file does not exist or cannot be read
    /// - The contents are not valid JSON or fail validation
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Check the configuration for values no backend can work with.
    pub fn validate(&self) -> Result<()> {
        let domain = self.domain.trim();
        if domain.is_empty() {
            return Err(Error::Config("domain cannot be empty".to_string()));
        }
        if domain.len() != self.domain.len()
            || self
                .domain
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == ';' || c == '{' || c == '}')
        {
            return Err(Error::Config(format!("invalid domain '{}'", self.domain)));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(Error::Config("db_path cannot be empty".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        self.protocols.validate()
    }

    /// Per-step deadline, if any.
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "domain": "vpn.example.com",
        "log_path": "/var/log/vpsgate.log",
        "db_path": "/var/lib/vpsgate/users.json",
        "protocols": {
            "ssh": { "port": 22 },
            "xray": { "port": 443, "config_path": "/etc/xray/config.json" },
            "squid": { "port": 3128, "passwd_file": "/etc/squid/passwd" }
        }
    }"#;

    #[test]
    fn test_from_json_applies_defaults() {
        let config = ManagerConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.domain, "vpn.example.com");
        assert_eq!(config.log_path, Some(PathBuf::from("/var/log/vpsgate.log")));
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.sweep_interval(), Duration::from_secs(3600));
        assert_eq!(config.protocols.udp.port, 7300);
        assert_eq!(config.kdf, KdfParams::default());
    }

    #[test]
    fn test_minimal_config() {
        let config = ManagerConfig::from_json(
            r#"{"domain": "vpn.example.com", "db_path": "users.json"}"#,
        )
        .unwrap();
        assert_eq!(config, ManagerConfig::new("vpn.example.com", "users.json"));
    }

    #[test]
    fn test_zero_step_timeout_disables_deadline() {
        let mut config = ManagerConfig::new("vpn.example.com", "users.json");
        config.step_timeout_secs = 0;
        assert_eq!(config.step_timeout(), None);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ManagerConfig::new("", "users.json");
        assert!(config.validate().is_err());

        config.domain = "vpn example.com".to_string();
        assert!(config.validate().is_err());

        config.domain = "vpn.example.com".to_string();
        config.db_path = PathBuf::new();
        assert!(config.validate().is_err());

        config.db_path = PathBuf::from("users.json");
        config.sweep_interval_secs = 0;
        assert!(config.validate().is_err());

        config.sweep_interval_secs = 60;
        config.protocols.ssh.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_domain_field_is_rejected() {
        let result = ManagerConfig::from_json(r#"{"db_path": "users.json"}"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ManagerConfig::load(&path).unwrap();
        assert_eq!(config.protocols.squid.port, 3128);

        let reparsed = ManagerConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let result = ManagerConfig::load(temp.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
