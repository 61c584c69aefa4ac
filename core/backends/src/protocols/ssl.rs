//! Per-account TLS certificates.
//!
//! Issues a self-signed certificate for the account's virtual host. The
//! WebSocket adapter references the resulting files, so this backend must
//! run before it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::warn;

use super::remove_artifact;
use crate::backend::{BackendAdapter, ProvisionContext};
use crate::command::CommandRunner;
use crate::config::SslConfig;
use vpsgate_common::{Credential, Result, Username};

/// Certificate path for an account.
pub fn cert_path(cert_dir: &Path, username: &Username) -> PathBuf {
    cert_dir.join(format!("{}.crt", username))
}

/// Private key path for an account.
pub fn key_path(key_dir: &Path, username: &Username) -> PathBuf {
    key_dir.join(format!("{}.key", username))
}

pub struct SslBackend {
    cert_dir: PathBuf,
    key_dir: PathBuf,
    validity_days: u32,
    runner: Arc<dyn CommandRunner>,
}

impl SslBackend {
    pub fn new(config: &SslConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            cert_dir: config.cert_dir.clone(),
            key_dir: config.key_dir.clone(),
            validity_days: config.validity_days,
            runner,
        }
    }
}

#[async_trait]
impl BackendAdapter for SslBackend {
    fn name(&self) -> &str {
        super::SSL
    }

    async fn provision(
        &self,
        username: &Username,
        _credential: &Credential,
        ctx: &ProvisionContext,
    ) -> Result<()> {
        fs::create_dir_all(&self.cert_dir).await?;
        fs::create_dir_all(&self.key_dir).await?;

        let cert = cert_path(&self.cert_dir, username).to_string_lossy().into_owned();
        let key = key_path(&self.key_dir, username).to_string_lossy().into_owned();
        let days = self.validity_days.to_string();
        let subject = format!("/CN={}/O=VpsGate", ctx.domain);

        let result = self
            .runner
            .run(
                "openssl",
                &[
                    "req",
                    "-x509",
                    "-newkey",
                    "rsa:2048",
                    "-nodes",
                    "-keyout",
                    key.as_str(),
                    "-out",
                    cert.as_str(),
                    "-days",
                    days.as_str(),
                    "-subj",
                    subject.as_str(),
                ],
            )
            .await
            .and_then(|out| out.check("openssl req"));

        if let Err(e) = result {
            // openssl may leave a key behind without a certificate.
            if let Err(cleanup) = self.deprovision(username).await {
                warn!(%username, error = %cleanup, "cleanup after failed openssl req failed");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        remove_artifact(&cert_path(&self.cert_dir, username)).await?;
        remove_artifact(&key_path(&self.key_dir, username)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::ScriptedRunner;
    use crate::command::CommandOutput;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (Arc<ScriptedRunner>, SslBackend) {
        let runner = Arc::new(ScriptedRunner::new());
        let config = SslConfig {
            cert_dir: temp.path().join("certs"),
            key_dir: temp.path().join("private"),
            validity_days: 30,
        };
        (runner.clone(), SslBackend::new(&config, runner))
    }

    #[tokio::test]
    async fn test_provision_issues_cert_for_domain() {
        let temp = TempDir::new().unwrap();
        let (runner, backend) = setup(&temp);
        let ctx = ProvisionContext {
            domain: "alice.vpn.example.com".to_string(),
        };

        backend
            .provision(&Username::new("alice").unwrap(), &Credential::new("pw").unwrap(), &ctx)
            .await
            .unwrap();

        let call = &runner.invocations()[0];
        assert_eq!(call.program, "openssl");
        assert!(call.args.contains(&"/CN=alice.vpn.example.com/O=VpsGate".to_string()));
        assert!(call.args.contains(&"30".to_string()));
        let out = temp.path().join("certs/alice.crt").to_string_lossy().into_owned();
        assert!(call.args.contains(&out));
        assert!(temp.path().join("private").is_dir());
    }

    #[tokio::test]
    async fn test_failed_issue_removes_partial_key() {
        let temp = TempDir::new().unwrap();
        let (runner, backend) = setup(&temp);
        std::fs::create_dir_all(temp.path().join("private")).unwrap();
        std::fs::write(temp.path().join("private/alice.key"), "partial").unwrap();
        runner.script("openssl", CommandOutput::failure(1, "unable to write"));
        let ctx = ProvisionContext {
            domain: "alice.vpn.example.com".to_string(),
        };

        let result = backend
            .provision(&Username::new("alice").unwrap(), &Credential::new("pw").unwrap(), &ctx)
            .await;

        assert!(result.is_err());
        assert!(!temp.path().join("private/alice.key").exists());
    }

    #[tokio::test]
    async fn test_deprovision_removes_cert_and_key() {
        let temp = TempDir::new().unwrap();
        let (_runner, backend) = setup(&temp);
        std::fs::create_dir_all(temp.path().join("certs")).unwrap();
        std::fs::create_dir_all(temp.path().join("private")).unwrap();
        std::fs::write(temp.path().join("certs/alice.crt"), "cert").unwrap();
        std::fs::write(temp.path().join("private/alice.key"), "key").unwrap();

        backend.deprovision(&Username::new("alice").unwrap()).await.unwrap();

        assert!(!temp.path().join("certs/alice.crt").exists());
        assert!(!temp.path().join("private/alice.key").exists());
    }
}
