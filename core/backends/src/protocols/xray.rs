//! Xray multiplexed inbound proxy.
//!
//! Accounts are clients of every `vmess`/`vless` inbound in the shared xray
//! config, identified by `email` = username and a random UUID.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::write_artifact;
use crate::backend::{BackendAdapter, ProvisionContext};
use crate::command::CommandRunner;
use crate::config::XrayConfig;
use crate::locks::ArtifactLocks;
use vpsgate_common::{Credential, Error, Result, Username};

const CLIENT_PROTOCOLS: [&str; 2] = ["vmess", "vless"];

pub struct XrayBackend {
    config_path: PathBuf,
    service: String,
    runner: Arc<dyn CommandRunner>,
    locks: ArtifactLocks,
}

impl XrayBackend {
    pub fn new(config: &XrayConfig, runner: Arc<dyn CommandRunner>, locks: ArtifactLocks) -> Self {
        Self {
            config_path: config.config_path.clone(),
            service: config.service.clone(),
            runner,
            locks,
        }
    }

    async fn load(&self) -> Result<Value> {
        let data = fs::read(&self.config_path).await.map_err(|e| {
            Error::Backend(format!(
                "failed to read xray config {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    async fn save(&self, config: &Value) -> Result<()> {
        let data = serde_json::to_vec_pretty(config)?;
        write_artifact(&self.config_path, &data, 0o644).await
    }

    async fn restart(&self) -> Result<()> {
        self.runner
            .run("systemctl", &["restart", self.service.as_str()])
            .await?
            .check("systemctl restart")?;
        Ok(())
    }

    /// Apply `edit` to the client list of every vmess/vless inbound.
    ///
    /// Unknown fields anywhere in the document are preserved.
    fn edit_clients(config: &mut Value, mut edit: impl FnMut(&mut Vec<Value>)) -> Result<usize> {
        let inbounds = config
            .get_mut("inbounds")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| Error::Backend("xray config has no inbounds array".to_string()))?;

        let mut touched = 0;
        for inbound in inbounds.iter_mut() {
            let protocol = inbound.get("protocol").and_then(Value::as_str).unwrap_or("");
            if !CLIENT_PROTOCOLS.contains(&protocol) {
                continue;
            }
            let Some(obj) = inbound.as_object_mut() else {
                continue;
            };
            let settings = obj.entry("settings").or_insert_with(|| json!({}));
            let Some(settings) = settings.as_object_mut() else {
                continue;
            };
            let clients = settings.entry("clients").or_insert_with(|| json!([]));
            if let Some(list) = clients.as_array_mut() {
                edit(list);
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn is_client(client: &Value, username: &Username) -> bool {
        client.get("email").and_then(Value::as_str) == Some(username.as_str())
    }
}

#[async_trait]
impl BackendAdapter for XrayBackend {
    fn name(&self) -> &str {
        super::XRAY
    }

    async fn provision(
        &self,
        username: &Username,
        _credential: &Credential,
        _ctx: &ProvisionContext,
    ) -> Result<()> {
        let _guard = self.locks.acquire(&self.config_path).await;

        let mut config = self.load().await?;
        let original = config.clone();
        let id = Uuid::new_v4().to_string();
        let touched = Self::edit_clients(&mut config, |clients| {
            clients.retain(|c| !Self::is_client(c, username));
            clients.push(json!({ "id": id, "email": username.as_str() }));
        })?;
        if touched == 0 {
            return Err(Error::Backend(
                "xray config has no vmess or vless inbound".to_string(),
            ));
        }
        debug!(%username, inbounds = touched, "added xray client");

        self.save(&config).await?;
        if let Err(e) = self.restart().await {
            // The saga only compensates earlier steps, so put the file back.
            if let Err(restore) = self.save(&original).await {
                warn!(%username, error = %restore, "failed to restore xray config");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        let _guard = self.locks.acquire(&self.config_path).await;

        let mut config = self.load().await?;
        let mut removed = 0;
        Self::edit_clients(&mut config, |clients| {
            let before = clients.len();
            clients.retain(|c| !Self::is_client(c, username));
            removed += before - clients.len();
        })?;
        if removed == 0 {
            return Ok(());
        }

        self.save(&config).await?;
        self.restart().await
    }
}
