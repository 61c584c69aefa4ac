//! Backend adapter trait definition.

use async_trait::async_trait;

use vpsgate_common::{Credential, Result, Username};

/// Per-account data an adapter may need while provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionContext {
    /// Virtual host bound to the account (`<username>.<domain suffix>`).
    pub domain: String,
}

impl ProvisionContext {
    /// Build the context for `username` under the configured domain suffix.
    pub fn for_account(username: &Username, domain_suffix: &str) -> Self {
        Self {
            domain: username.virtual_host(domain_suffix),
        }
    }
}

/// A single network-access mechanism with its own provisioning side effects.
///
/// Adapters are opaque, possibly-failing capabilities. They are not required
/// to be idempotent; the orchestrator compensates on its own.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Get the backend name (e.g., "ssh", "xray", "squid").
    ///
    /// This is the name recorded in the account's protocol set.
    fn name(&self) -> &str;

    /// Create the account on this backend.
    ///
    /// # Postconditions
    /// - On success the account is usable through this backend
    ///
    /// # Errors
    /// - Command or I/O failure; partial artifacts may remain, and the
    ///   orchestrator calls [`BackendAdapter::deprovision`] only for
    ///   adapters that reported success
    async fn provision(
        &self,
        username: &Username,
        credential: &Credential,
        ctx: &ProvisionContext,
    ) -> Result<()>;

    /// Remove every artifact this backend holds for the account.
    ///
    /// Used both for account removal and for saga compensation.
    async fn deprovision(&self, username: &Username) -> Result<()>;
}
