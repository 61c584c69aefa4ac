//! External command execution.
//!
//! Most adapters are thin wrappers around system tools (`useradd`,
//! `chpasswd`, `htpasswd`, `openssl`, `systemctl`). They all go through
//! [`CommandRunner`] so the real process layer can be swapped for a
//! scripted one in tests.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use vpsgate_common::{Error, Result};

/// Default timeout for a single external command.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(60);

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Successful output with no captured streams.
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Failed output with the given exit code and stderr text.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into().into_bytes(),
        }
    }

    /// Whether the command exited with status 0.
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`Error::Command`] naming `what` failed.
    pub fn check(self, what: &str) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let stderr = String::from_utf8_lossy(&self.stderr);
        let status = self
            .code
            .map(|c| format!("exit code {}", c))
            .unwrap_or_else(|| "killed by signal".to_string());
        Err(Error::Command(format!(
            "{} failed ({}): {}",
            what,
            status,
            stderr.trim()
        )))
    }
}

/// Process execution port used by adapters.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    ///
    /// # Errors
    /// - Spawn failure or timeout. A non-zero exit is NOT an error here;
    ///   callers decide via [`CommandOutput::check`].
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Like [`CommandRunner::run`], feeding `input` on stdin.
    ///
    /// Used for secrets, which must never appear in the argument list.
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<CommandOutput>;
}

/// Production runner backed by `tokio::process`.
///
/// Children are spawned with `kill_on_drop`, so a command that outlives
/// its timeout is killed rather than left running.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn execute(&self, program: &str, args: &[&str], input: Option<&[u8]>) -> Result<CommandOutput> {
        debug!(program, ?args, "running command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Command(format!("failed to spawn {}: {}", program, e)))?;

        if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(bytes).await?;
            // Dropping stdin closes the pipe so the child sees EOF.
            drop(stdin);
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} timed out after {}s",
                    program,
                    self.timeout.as_secs()
                ))
            })??;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        self.execute(program, args, None).await
    }

    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<CommandOutput> {
        self.execute(program, args, Some(input)).await
    }
}
