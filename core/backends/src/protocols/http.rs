//! HTTP proxy behind nginx basic auth.
//!
//! Each account gets its own server block; credentials live in the shared
//! htpasswd file that every block points at.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use super::htpasswd::HtpasswdFile;
use super::{remove_artifact, write_artifact};
use crate::backend::{BackendAdapter, ProvisionContext};
use crate::command::CommandRunner;
use crate::config::HttpConfig;
use crate::locks::ArtifactLocks;
use vpsgate_common::{Credential, Result, Username};

pub struct HttpBackend {
    port: u16,
    config_dir: PathBuf,
    upstream: String,
    htpasswd: HtpasswdFile,
}

impl HttpBackend {
    pub fn new(config: &HttpConfig, runner: Arc<dyn CommandRunner>, locks: ArtifactLocks) -> Self {
        Self {
            port: config.port,
            config_dir: config.config_dir.clone(),
            upstream: config.upstream.clone(),
            htpasswd: HtpasswdFile::new(config.htpasswd_path.clone(), runner, locks),
        }
    }

    fn site_path(&self, username: &Username) -> PathBuf {
        self.config_dir.join(format!("{}_http.conf", username))
    }

    fn render(&self, domain: &str) -> String {
        format!(
            r#"server {{
    listen {port};
    server_name {domain};

    location / {{
        auth_basic "Restricted";
        auth_basic_user_file {htpasswd};
        proxy_pass http://{upstream};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    }}
}}
"#,
            port = self.port,
            domain = domain,
            htpasswd = self.htpasswd.path().display(),
            upstream = self.upstream,
        )
    }
}

#[async_trait]
impl BackendAdapter for HttpBackend {
    fn name(&self) -> &str {
        super::HTTP
    }

    async fn provision(
        &self,
        username: &Username,
        credential: &Credential,
        ctx: &ProvisionContext,
    ) -> Result<()> {
        let site_path = self.site_path(username);
        write_artifact(&site_path, self.render(&ctx.domain).as_bytes(), 0o644).await?;

        if let Err(e) = self.htpasswd.upsert(username, credential).await {
            if let Err(cleanup) = remove_artifact(&site_path).await {
                warn!(%username, error = %cleanup, "failed to remove http server block");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        let site = remove_artifact(&self.site_path(username)).await;
        let entry = self.htpasswd.remove(username).await;
        site.and(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::ScriptedRunner;
    use crate::command::CommandOutput;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (Arc<ScriptedRunner>, HttpBackend) {
        let runner = Arc::new(ScriptedRunner::new());
        let config = HttpConfig {
            port: 8080,
            config_dir: temp.path().join("conf.d"),
            htpasswd_path: temp.path().join(".htpasswd"),
            upstream: "127.0.0.1:10000".to_string(),
        };
        let backend = HttpBackend::new(&config, runner.clone(), ArtifactLocks::new());
        (runner, backend)
    }

    fn ctx() -> ProvisionContext {
        ProvisionContext {
            domain: "alice.vpn.example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_provision_writes_block_and_credential() {
        let temp = TempDir::new().unwrap();
        let (runner, backend) = setup(&temp);

        backend
            .provision(&Username::new("alice").unwrap(), &Credential::new("s3cret").unwrap(), &ctx())
            .await
            .unwrap();

        let site = std::fs::read_to_string(temp.path().join("conf.d/alice_http.conf")).unwrap();
        assert!(site.contains("listen 8080;"));
        assert!(site.contains("server_name alice.vpn.example.com;"));
        assert!(site.contains(&format!(
            "auth_basic_user_file {};",
            temp.path().join(".htpasswd").display()
        )));
        assert!(!site.contains("s3cret"));

        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "htpasswd");
        assert_eq!(calls[0].stdin.as_deref(), Some("s3cret\n"));
    }

    #[tokio::test]
    async fn test_htpasswd_failure_removes_block() {
        let temp = TempDir::new().unwrap();
        let (runner, backend) = setup(&temp);
        runner.script("htpasswd", CommandOutput::failure(1, "htpasswd: cannot create file"));

        let result = backend
            .provision(&Username::new("alice").unwrap(), &Credential::new("pw").unwrap(), &ctx())
            .await;

        assert!(result.is_err());
        assert!(!temp.path().join("conf.d/alice_http.conf").exists());
    }

    #[tokio::test]
    async fn test_deprovision_removes_block_and_entry() {
        let temp = TempDir::new().unwrap();
        let (runner, backend) = setup(&temp);
        let alice = Username::new("alice").unwrap();
        backend
            .provision(&alice, &Credential::new("pw").unwrap(), &ctx())
            .await
            .unwrap();
        // The scripted htpasswd does not create the file.
        std::fs::write(temp.path().join(".htpasswd"), "alice:$apr1$x\n").unwrap();

        backend.deprovision(&alice).await.unwrap();

        assert!(!temp.path().join("conf.d/alice_http.conf").exists());
        let last = runner.invocations().pop().unwrap();
        assert_eq!(last.args[0], "-D");
        assert_eq!(last.args.last().unwrap(), "alice");
    }
}
