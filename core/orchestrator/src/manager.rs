//! Account saga coordinator.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::error::{
    BackendFailure, OrchestratorError, PersistenceError, ProvisionFailure, RemovalReport, Result,
};
use vpsgate_backends::{
    create_default_registry, BackendAdapter, BackendContext, BackendRegistry, ProvisionContext,
};
use vpsgate_common::{Credential, Error, Username};
use vpsgate_crypto::{hash_credential, verify_credential, KdfParams};
use vpsgate_registry::{Account, AccountRegistry};

/// `tracing` target for the add/remove audit trail.
pub const AUDIT_TARGET: &str = "vpsgate::audit";

/// A committed account plus the outcome of persisting it.
///
/// `persistence` is set when every backend succeeded but the registry file
/// could not be written.
#[derive(Debug)]
pub struct AddOutcome {
    pub account: Account,
    pub persistence: Option<PersistenceError>,
}

/// Provisions and removes accounts across an ordered set of backends.
pub struct Orchestrator {
    backends: Vec<Arc<dyn BackendAdapter>>,
    registry: Mutex<AccountRegistry>,
    domain: String,
    kdf: KdfParams,
    step_timeout: Option<Duration>,
}

impl Orchestrator {
    /// Create an orchestrator over `backends`, provisioned in the given order.
    pub fn new(
        backends: Vec<Arc<dyn BackendAdapter>>,
        registry: AccountRegistry,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            backends,
            registry: Mutex::new(registry),
            domain: domain.into(),
            kdf: KdfParams::default(),
            step_timeout: None,
        }
    }

    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Bound every backend call; an elapsed deadline fails the step.
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Build from configuration with the default backend registry.
    ///
    /// Loads the account registry from `config.db_path`.
    pub async fn from_config(config: &ManagerConfig) -> vpsgate_common::Result<Self> {
        let ctx = BackendContext::new(config.protocols.clone());
        Self::from_config_with(config, &create_default_registry(), &ctx).await
    }

    /// Build from configuration with a caller-supplied backend registry.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - A configured backend is not registered
    /// - The account registry cannot be loaded
    pub async fn from_config_with(
        config: &ManagerConfig,
        backends: &BackendRegistry,
        ctx: &BackendContext,
    ) -> vpsgate_common::Result<Self> {
        config.validate()?;
        let adapters = backends.build(&config.protocols.backend_order(), ctx)?;
        let registry = AccountRegistry::load(&config.db_path).await?;

        Ok(Self::new(adapters, registry, config.domain.clone())
            .with_kdf_params(config.kdf.clone())
            .with_step_timeout(config.step_timeout()))
    }

    /// Backend names in saga order.
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Provision `username` on every backend, then record it.
    ///
    /// # Postconditions
    /// - On `Ok`, the account is provisioned everywhere and in the registry
    /// - On `Err`, no record exists and every backend provisioned by this
    ///   call was asked to deprovision, in reverse order
    ///
    /// # Errors
    /// - `DuplicateIdentity` if the account exists
    /// - `InvalidInput` if no backends are configured or the expiry overflows
    /// - `Digest` if hashing fails (nothing was provisioned)
    /// - `ProvisionFailed` with the failing backend and suppressed
    ///   compensation failures
    pub async fn add_account(
        &self,
        username: &Username,
        credential: &Credential,
        days: u32,
    ) -> Result<AddOutcome> {
        let mut registry = self.registry.lock().await;

        if registry.contains(username) {
            return Err(OrchestratorError::DuplicateIdentity(username.clone()));
        }
        if self.backends.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "no backends configured".to_string(),
            ));
        }
        let expire_date = Utc::now()
            .checked_add_signed(ChronoDuration::days(i64::from(days)))
            .ok_or_else(|| {
                OrchestratorError::InvalidInput(format!("{} days is out of range", days))
            })?;
        let digest = self.digest(credential).await?;

        let ctx = ProvisionContext::for_account(username, &self.domain);
        let mut provisioned: Vec<&Arc<dyn BackendAdapter>> = Vec::with_capacity(self.backends.len());

        for backend in &self.backends {
            debug!(backend = backend.name(), %username, "provisioning");
            let result = self
                .step(backend.name(), "provision", backend.provision(username, credential, &ctx))
                .await;

            if let Err(cause) = result {
                warn!(
                    backend = backend.name(),
                    %username,
                    error = %cause,
                    "provisioning failed, compensating {} backend(s)",
                    provisioned.len()
                );
                let suppressed = self.compensate(username, &provisioned).await;
                return Err(OrchestratorError::ProvisionFailed(ProvisionFailure {
                    backend: backend.name().to_string(),
                    cause,
                    suppressed,
                }));
            }
            provisioned.push(backend);
        }

        let protocols = self.backend_names();
        let account = Account::new(username.clone(), digest, expire_date, protocols);
        registry
            .add(account.clone())
            .map_err(|_| OrchestratorError::DuplicateIdentity(username.clone()))?;

        let persistence = self.persist(&registry).await;

        info!(
            target: AUDIT_TARGET,
            action = "add",
            %username,
            expire_date = %account.expire_date.to_rfc3339(),
            protocols = ?account.protocols,
            persisted = persistence.is_none(),
            "account added"
        );

        Ok(AddOutcome {
            account,
            persistence,
        })
    }

    /// Drop the record for `username` and deprovision it everywhere it was
    /// recorded.
    ///
    /// Every recorded backend is attempted, in reverse of recorded order,
    /// whatever earlier ones return. The record is removed even if all of
    /// them fail.
    ///
    /// # Errors
    /// - `NotFound` if the account does not exist (registry unchanged)
    /// - `DeprovisionFailed` listing every backend that failed, plus any
    ///   persistence failure
    /// - `Persistence` if only the registry write failed
    pub async fn remove_account(&self, username: &Username) -> Result<()> {
        let mut registry = self.registry.lock().await;

        let account = registry
            .remove(username)
            .ok_or_else(|| OrchestratorError::NotFound(username.clone()))?;

        let mut failures = Vec::new();
        for name in account.protocols.iter().rev() {
            let Some(backend) = self.backend(name) else {
                warn!(backend = %name, %username, "recorded backend is not configured");
                failures.push(BackendFailure::new(
                    name.as_str(),
                    Error::NotFound(format!("backend '{}' is not configured", name)),
                ));
                continue;
            };

            debug!(backend = %name, %username, "deprovisioning");
            if let Err(cause) = self
                .step(name, "deprovision", backend.deprovision(username))
                .await
            {
                warn!(backend = %name, %username, error = %cause, "deprovisioning failed");
                failures.push(BackendFailure::new(name.as_str(), cause));
            }
        }

        let persistence = self.persist(&registry).await;

        info!(
            target: AUDIT_TARGET,
            action = "remove",
            %username,
            failed_backends = failures.len(),
            persisted = persistence.is_none(),
            "account removed"
        );

        match (failures.is_empty(), persistence) {
            (true, None) => Ok(()),
            (true, Some(persistence)) => Err(OrchestratorError::Persistence(persistence)),
            (false, persistence) => Err(OrchestratorError::DeprovisionFailed(RemovalReport {
                username: username.clone(),
                failures,
                persistence,
            })),
        }
    }

    /// All accounts in insertion order.
    pub async fn list(&self) -> Vec<Account> {
        self.registry.lock().await.list().to_vec()
    }

    pub async fn find(&self, username: &Username) -> Option<Account> {
        self.registry.lock().await.find(username).cloned()
    }

    /// Accounts expired at `now`.
    pub async fn expired(&self, now: DateTime<Utc>) -> Vec<Username> {
        self.registry.lock().await.expired(now)
    }

    /// Check `credential` against the stored digest.
    ///
    /// # Errors
    /// - `NotFound` if the account does not exist
    /// - `Digest` if the stored digest cannot be parsed
    pub async fn verify(&self, username: &Username, credential: &Credential) -> Result<bool> {
        let digest = self
            .find(username)
            .await
            .ok_or_else(|| OrchestratorError::NotFound(username.clone()))?
            .password_digest;

        let credential = credential.clone();
        tokio::task::spawn_blocking(move || verify_credential(&credential, &digest))
            .await
            .map_err(|e| OrchestratorError::Digest(Error::Crypto(e.to_string())))?
            .map_err(OrchestratorError::Digest)
    }

    async fn digest(&self, credential: &Credential) -> Result<String> {
        let credential = credential.clone();
        let kdf = self.kdf.clone();
        tokio::task::spawn_blocking(move || hash_credential(&credential, &kdf))
            .await
            .map_err(|e| OrchestratorError::Digest(Error::Crypto(e.to_string())))?
            .map_err(OrchestratorError::Digest)
    }

    /// Undo `provisioned` in reverse order, collecting failures.
    async fn compensate(
        &self,
        username: &Username,
        provisioned: &[&Arc<dyn BackendAdapter>],
    ) -> Vec<BackendFailure> {
        let mut suppressed = Vec::new();
        for backend in provisioned.iter().rev() {
            debug!(backend = backend.name(), %username, "compensating");
            if let Err(cause) = self
                .step(backend.name(), "deprovision", backend.deprovision(username))
                .await
            {
                warn!(
                    backend = backend.name(),
                    %username,
                    error = %cause,
                    "compensation failed"
                );
                suppressed.push(BackendFailure::new(backend.name(), cause));
            }
        }
        suppressed
    }

    /// Run one backend call under the step deadline.
    async fn step<F>(&self, backend: &str, op: &str, call: F) -> vpsgate_common::Result<()>
    where
        F: Future<Output = vpsgate_common::Result<()>>,
    {
        match self.step_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                Error::Timeout(format!("{} {} exceeded {:?}", backend, op, limit))
            })?,
            None => call.await,
        }
    }

    async fn persist(&self, registry: &AccountRegistry) -> Option<PersistenceError> {
        match registry.save().await {
            Ok(()) => None,
            Err(cause) => {
                error!(
                    path = %registry.path().display(),
                    error = %cause,
                    "failed to persist registry"
                );
                Some(PersistenceError { cause })
            }
        }
    }

    fn backend(&self, name: &str) -> Option<&Arc<dyn BackendAdapter>> {
        self.backends.iter().find(|b| b.name() == name)
    }
}
