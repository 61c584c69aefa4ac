//! UDP tunnel, one JSON config per account.

use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use zeroize::Zeroizing;

use super::{remove_artifact, write_artifact};
use crate::backend::{BackendAdapter, ProvisionContext};
use crate::config::UdpConfig;
use vpsgate_common::{Credential, Result, Username};

pub struct UdpBackend {
    port: u16,
    config_dir: PathBuf,
    timeout_secs: u32,
    buffer_size: u32,
}

impl UdpBackend {
    pub fn new(config: &UdpConfig) -> Self {
        Self {
            port: config.port,
            config_dir: config.config_dir.clone(),
            timeout_secs: config.timeout_secs,
            buffer_size: config.buffer_size,
        }
    }

    fn config_path(&self, username: &Username) -> PathBuf {
        self.config_dir.join(format!("{}.json", username))
    }
}

#[async_trait]
impl BackendAdapter for UdpBackend {
    fn name(&self) -> &str {
        super::UDP
    }

    async fn provision(
        &self,
        username: &Username,
        credential: &Credential,
        _ctx: &ProvisionContext,
    ) -> Result<()> {
        let config = json!({
            "listen": format!(":{}", self.port),
            "users": { username.as_str(): credential.expose() },
            "timeout": self.timeout_secs,
            "buffer_size": self.buffer_size,
        });
        let data = Zeroizing::new(serde_json::to_vec_pretty(&config)?);
        // Holds the plaintext credential.
        write_artifact(&self.config_path(username), &data, 0o600).await
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        remove_artifact(&self.config_path(username)).await
    }
}
