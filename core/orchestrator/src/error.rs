//! Saga outcome errors.

use std::fmt;
use thiserror::Error;

use vpsgate_common::{Error, Username};

/// One backend that failed, with its error.
#[derive(Debug)]
pub struct BackendFailure {
    pub backend: String,
    pub cause: Error,
}

impl BackendFailure {
    pub fn new(backend: impl Into<String>, cause: Error) -> Self {
        Self {
            backend: backend.into(),
            cause,
        }
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend, self.cause)
    }
}

fn join(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// An add saga that stopped at `backend`.
///
/// `suppressed` lists compensation steps that failed while undoing the
/// backends provisioned before it.
#[derive(Debug)]
pub struct ProvisionFailure {
    pub backend: String,
    pub cause: Error,
    pub suppressed: Vec<BackendFailure>,
}

impl fmt::Display for ProvisionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provisioning failed at '{}': {}", self.backend, self.cause)?;
        if !self.suppressed.is_empty() {
            write!(
                f,
                " ({} compensation failure(s): {})",
                self.suppressed.len(),
                join(&self.suppressed)
            )?;
        }
        Ok(())
    }
}

/// The registry could not be written.
///
/// The backends and the durable registry may now disagree.
#[derive(Debug, Error)]
#[error("failed to persist registry: {cause}")]
pub struct PersistenceError {
    pub cause: Error,
}

/// Everything that went wrong while removing an account.
///
/// The record is gone from the registry even when this is non-empty.
#[derive(Debug)]
pub struct RemovalReport {
    pub username: Username,
    pub failures: Vec<BackendFailure>,
    pub persistence: Option<PersistenceError>,
}

impl RemovalReport {
    /// True when every backend and the registry write succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.persistence.is_none()
    }
}

impl fmt::Display for RemovalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account '{}' removed with errors", self.username)?;
        if !self.failures.is_empty() {
            write!(f, ": {}", join(&self.failures))?;
        }
        if let Some(persistence) = &self.persistence {
            write!(f, "; {}", persistence)?;
        }
        Ok(())
    }
}

/// Orchestrator operation errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("account '{0}' already exists")]
    DuplicateIdentity(Username),

    #[error("account '{0}' not found")]
    NotFound(Username),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Add aborted and compensated. No record was created.
    #[error("{0}")]
    ProvisionFailed(ProvisionFailure),

    /// Remove finished with failures. The record was dropped regardless.
    #[error("{0}")]
    DeprovisionFailed(RemovalReport),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Credential hashing failed before any side effect.
    #[error("credential digest failed: {0}")]
    Digest(Error),
}

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_failure_lists_suppressed() {
        let err = OrchestratorError::ProvisionFailed(ProvisionFailure {
            backend: "squid".to_string(),
            cause: Error::Command("htpasswd failed (exit code 1): denied".to_string()),
            suppressed: vec![BackendFailure::new(
                "ssh",
                Error::Command("userdel failed".to_string()),
            )],
        });
        let msg = err.to_string();
        assert!(msg.starts_with("provisioning failed at 'squid'"));
        assert!(msg.contains("1 compensation failure(s): ssh: Command failed: userdel failed"));
    }

    #[test]
    fn test_removal_report_display() {
        let report = RemovalReport {
            username: Username::new("alice").unwrap(),
            failures: vec![
                BackendFailure::new("xray", Error::Backend("no inbounds".to_string())),
                BackendFailure::new("ssh", Error::Timeout("ssh deprovision".to_string())),
            ],
            persistence: Some(PersistenceError {
                cause: Error::Io(std::io::Error::other("disk full")),
            }),
        };
        assert!(!report.is_clean());
        let msg = report.to_string();
        assert!(msg.contains("xray: Backend error: no inbounds; ssh: Timed out"));
        assert!(msg.contains("failed to persist registry"));
    }
}
