//! Squid proxy with basic auth against a shared password file.

use async_trait::async_trait;
use std::sync::Arc;

use super::htpasswd::HtpasswdFile;
use crate::backend::{BackendAdapter, ProvisionContext};
use crate::command::CommandRunner;
use crate::config::SquidConfig;
use crate::locks::ArtifactLocks;
use vpsgate_common::{Credential, Result, Username};

pub struct SquidBackend {
    passwd: HtpasswdFile,
}

impl SquidBackend {
    pub fn new(config: &SquidConfig, runner: Arc<dyn CommandRunner>, locks: ArtifactLocks) -> Self {
        Self {
            passwd: HtpasswdFile::new(config.passwd_file.clone(), runner, locks),
        }
    }
}

#[async_trait]
impl BackendAdapter for SquidBackend {
    fn name(&self) -> &str {
        super::SQUID
    }

    async fn provision(
        &self,
        username: &Username,
        credential: &Credential,
        _ctx: &ProvisionContext,
    ) -> Result<()> {
        self.passwd.upsert(username, credential).await
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        self.passwd.remove(username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::ScriptedRunner;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_provision_and_deprovision_use_passwd_file() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let config = SquidConfig {
            port: 3128,
            passwd_file: temp.path().join("squid/passwd"),
        };
        let backend = SquidBackend::new(&config, runner.clone(), ArtifactLocks::new());
        let alice = Username::new("alice").unwrap();
        let ctx = ProvisionContext {
            domain: "alice.vpn.example.com".to_string(),
        };

        backend
            .provision(&alice, &Credential::new("pw").unwrap(), &ctx)
            .await
            .unwrap();
        assert!(temp.path().join("squid").is_dir());

        std::fs::write(&config.passwd_file, "alice:$apr1$x\n").unwrap();
        backend.deprovision(&alice).await.unwrap();

        let calls = runner.invocations();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].args.contains(&"-c".to_string()));
        assert_eq!(calls[1].args[0], "-D");
    }

    #[tokio::test]
    async fn test_shared_lock_serializes_updates() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let locks = ArtifactLocks::new();
        let config = SquidConfig {
            port: 3128,
            passwd_file: temp.path().join("passwd"),
        };
        let backend = SquidBackend::new(&config, runner.clone(), locks.clone());

        let guard = locks.acquire(&config.passwd_file).await;
        let pending = tokio::spawn(async move {
            let ctx = ProvisionContext {
                domain: "bob.vpn.example.com".to_string(),
            };
            backend
                .provision(&Username::new("bob").unwrap(), &Credential::new("pw").unwrap(), &ctx)
                .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(runner.invocations().is_empty());

        drop(guard);
        pending.await.unwrap().unwrap();
        assert_eq!(runner.invocations().len(), 1);
    }
}
