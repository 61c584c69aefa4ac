//! System accounts for OpenSSH tunnelling.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::backend::{BackendAdapter, ProvisionContext};
use crate::command::CommandRunner;
use crate::config::SshConfig;
use vpsgate_common::{Credential, Result, Username};

/// Set a system account's password through `chpasswd`.
pub(crate) async fn set_system_password(
    runner: &dyn CommandRunner,
    username: &Username,
    credential: &Credential,
) -> Result<()> {
    let line = Zeroizing::new(format!("{}:{}\n", username, credential.expose()));
    runner
        .run_with_stdin("chpasswd", &[], line.as_bytes())
        .await?
        .check("chpasswd")?;
    Ok(())
}

/// Whether `id -u` knows the system account.
pub(crate) async fn system_account_exists(
    runner: &dyn CommandRunner,
    username: &Username,
) -> Result<bool> {
    let out = runner.run("id", &["-u", username.as_str()]).await?;
    Ok(out.is_success())
}

/// Creates a shell-less system user with a password.
pub struct SshBackend {
    shell: String,
    runner: Arc<dyn CommandRunner>,
}

impl SshBackend {
    pub fn new(config: &SshConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            shell: config.shell.clone(),
            runner,
        }
    }
}

#[async_trait]
impl BackendAdapter for SshBackend {
    fn name(&self) -> &str {
        super::SSH
    }

    async fn provision(
        &self,
        username: &Username,
        credential: &Credential,
        _ctx: &ProvisionContext,
    ) -> Result<()> {
        self.runner
            .run("useradd", &["-m", "-s", self.shell.as_str(), username.as_str()])
            .await?
            .check("useradd")?;

        // The user exists but cannot log in; undo it here since the saga
        // only compensates steps that succeeded.
        if let Err(e) = set_system_password(self.runner.as_ref(), username, credential).await {
            match self.runner.run("userdel", &["-r", username.as_str()]).await {
                Ok(out) if out.is_success() => {}
                Ok(out) => warn!(%username, code = ?out.code, "userdel after failed chpasswd exited non-zero"),
                Err(del) => warn!(%username, error = %del, "userdel after failed chpasswd failed"),
            }
            return Err(e);
        }
        Ok(())
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        // Dropbear shares the account and may have deleted it already.
        if !system_account_exists(self.runner.as_ref(), username).await? {
            debug!(%username, "system account already gone");
            return Ok(());
        }
        self.runner
            .run("userdel", &["-r", username.as_str()])
            .await?
            .check("userdel")?;
        Ok(())
    }
}
