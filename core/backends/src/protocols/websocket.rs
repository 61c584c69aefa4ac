//! TLS-terminated WebSocket tunnel, one nginx server block per account.

use async_trait::async_trait;
use std::path::PathBuf;

use super::ssl::{cert_path, key_path};
use super::{remove_artifact, write_artifact};
use crate::backend::{BackendAdapter, ProvisionContext};
use crate::config::{SslConfig, WebSocketConfig};
use vpsgate_common::{Credential, Result, Username};

pub struct WebSocketBackend {
    port: u16,
    config_dir: PathBuf,
    upstream: String,
    cert_dir: PathBuf,
    key_dir: PathBuf,
}

impl WebSocketBackend {
    pub fn new(config: &WebSocketConfig, ssl: &SslConfig) -> Self {
        Self {
            port: config.port,
            config_dir: config.config_dir.clone(),
            upstream: config.upstream.clone(),
            cert_dir: ssl.cert_dir.clone(),
            key_dir: ssl.key_dir.clone(),
        }
    }

    fn site_path(&self, username: &Username) -> PathBuf {
        self.config_dir.join(format!("{}_websocket.conf", username))
    }

    fn render(&self, username: &Username, domain: &str) -> String {
        format!(
            r#"server {{
    listen {port} ssl;
    server_name {domain};

    ssl_certificate {cert};
    ssl_certificate_key {key};
    ssl_protocols TLSv1.2 TLSv1.3;
    ssl_ciphers ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305;

    location /ws {{
        proxy_pass http://{upstream};
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
        proxy_set_header Host $http_host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }}
}}
"#,
            port = self.port,
            domain = domain,
            cert = cert_path(&self.cert_dir, username).display(),
            key = key_path(&self.key_dir, username).display(),
            upstream = self.upstream,
        )
    }
}

#[async_trait]
impl BackendAdapter for WebSocketBackend {
    fn name(&self) -> &str {
        super::WEBSOCKET
    }

    async fn provision(
        &self,
        username: &Username,
        _credential: &Credential,
        ctx: &ProvisionContext,
    ) -> Result<()> {
        let site = self.render(username, &ctx.domain);
        write_artifact(&self.site_path(username), site.as_bytes(), 0o644).await
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        remove_artifact(&self.site_path(username)).await
    }
}
