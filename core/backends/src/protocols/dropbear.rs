//! Dropbear logins.
//!
//! Dropbear authenticates against the same system accounts as OpenSSH, so
//! this adapter only makes sure the account exists with the given password.
//! When the ssh backend runs first the account is already there.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::ssh::{set_system_password, system_account_exists};
use crate::backend::{BackendAdapter, ProvisionContext};
use crate::command::CommandRunner;
use crate::config::DropbearConfig;
use vpsgate_common::{Credential, Result, Username};

pub struct DropbearBackend {
    shell: String,
    runner: Arc<dyn CommandRunner>,
}

impl DropbearBackend {
    pub fn new(config: &DropbearConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            shell: config.shell.clone(),
            runner,
        }
    }
}

#[async_trait]
impl BackendAdapter for DropbearBackend {
    fn name(&self) -> &str {
        super::DROPBEAR
    }

    async fn provision(
        &self,
        username: &Username,
        credential: &Credential,
        _ctx: &ProvisionContext,
    ) -> Result<()> {
        let created = if system_account_exists(self.runner.as_ref(), username).await? {
            debug!(%username, "system account already present");
            false
        } else {
            self.runner
                .run("useradd", &["-m", "-s", self.shell.as_str(), username.as_str()])
                .await?
                .check("useradd")?;
            true
        };

        if let Err(e) = set_system_password(self.runner.as_ref(), username, credential).await {
            if created {
                match self.runner.run("userdel", &["-r", username.as_str()]).await {
                    Ok(out) if out.is_success() => {}
                    Ok(out) => warn!(%username, code = ?out.code, "userdel after failed chpasswd exited non-zero"),
                    Err(del) => warn!(%username, error = %del, "userdel after failed chpasswd failed"),
                }
            }
            return Err(e);
        }
        Ok(())
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        if !system_account_exists(self.runner.as_ref(), username).await? {
            return Ok(());
        }
        self.runner
            .run("userdel", &["-r", username.as_str()])
            .await?
            .check("userdel")?;
        Ok(())
    }
}
