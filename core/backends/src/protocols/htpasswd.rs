//! htpasswd-style password files shared by every account.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use zeroize::Zeroizing;

use crate::command::CommandRunner;
use crate::locks::ArtifactLocks;
use vpsgate_common::{Credential, Result, Username};

/// One htpasswd file, updated through the `htpasswd` tool.
///
/// Every update holds the file's artifact lock for its whole
/// read-modify-write.
pub struct HtpasswdFile {
    path: PathBuf,
    runner: Arc<dyn CommandRunner>,
    locks: ArtifactLocks,
}

impl HtpasswdFile {
    pub fn new(
        path: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        locks: ArtifactLocks,
    ) -> Self {
        Self {
            path: path.into(),
            runner,
            locks,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add or replace the entry for `username`.
    ///
    /// The password is passed on stdin (`-i`), never in the argument list.
    /// The file is created (`-c`) if it does not exist yet.
    pub async fn upsert(&self, username: &Username, credential: &Credential) -> Result<()> {
        let _guard = self.locks.acquire(&self.path).await;

        let create = !fs::try_exists(&self.path).await?;
        if create {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).await?;
            }
        }

        let path = self.path.to_string_lossy().into_owned();
        let mut args = vec!["-i"];
        if create {
            args.push("-c");
        }
        args.push(path.as_str());
        args.push(username.as_str());

        let input = Zeroizing::new(format!("{}\n", credential.expose()));
        self.runner
            .run_with_stdin("htpasswd", &args, input.as_bytes())
            .await?
            .check("htpasswd")?;
        Ok(())
    }

    /// Delete the entry for `username`. A missing file means nothing to do.
    pub async fn remove(&self, username: &Username) -> Result<()> {
        let _guard = self.locks.acquire(&self.path).await;

        if !fs::try_exists(&self.path).await? {
            return Ok(());
        }

        let path = self.path.to_string_lossy().into_owned();
        self.runner
            .run("htpasswd", &["-D", path.as_str(), username.as_str()])
            .await?
            .check("htpasswd -D")?;
        Ok(())
    }
}
