//! In-memory backend for testing.
//!
//! Tracks provisioned accounts in memory, records every call into a
//! [`CallLog`] that several backends can share, and injects failures or
//! latency on demand.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::backend::{BackendAdapter, ProvisionContext};
use vpsgate_common::{Credential, Error, Result, Username};

/// Which adapter operation was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Provision,
    Deprovision,
}

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub backend: String,
    pub kind: CallKind,
    pub username: String,
}

/// Call journal, in invocation order.
///
/// Cloning shares the journal, so one log can observe a whole saga.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<BackendCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, backend: &str, kind: CallKind, username: &Username) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(BackendCall {
                backend: backend.to_string(),
                kind,
                username: username.to_string(),
            });
    }

    /// Snapshot of all calls so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `kind` calls made on `backend`.
    pub fn count(&self, backend: &str, kind: CallKind) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.backend == backend && c.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Backend that keeps its accounts in memory.
pub struct MemoryBackend {
    name: String,
    accounts: Mutex<BTreeSet<String>>,
    log: CallLog,
    fail_provision: AtomicBool,
    fail_deprovision: AtomicBool,
    delay: Option<Duration>,
}

impl MemoryBackend {
    /// Create a backend with its own call log.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_log(name, CallLog::new())
    }

    /// Create a backend recording into a shared call log.
    pub fn with_log(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            accounts: Mutex::new(BTreeSet::new()),
            log,
            fail_provision: AtomicBool::new(false),
            fail_deprovision: AtomicBool::new(false),
            delay: None,
        }
    }

    /// Sleep for `delay` at the start of every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make subsequent `provision` calls fail.
    pub fn fail_provision(&self, fail: bool) {
        self.fail_provision.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `deprovision` calls fail.
    pub fn fail_deprovision(&self, fail: bool) {
        self.fail_deprovision.store(fail, Ordering::SeqCst);
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn has_account(&self, username: &Username) -> bool {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(username.as_str())
    }

    /// Provisioned usernames, sorted.
    pub fn accounts(&self) -> Vec<String> {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn provision_count(&self) -> usize {
        self.log.count(&self.name, CallKind::Provision)
    }

    pub fn deprovision_count(&self) -> usize {
        self.log.count(&self.name, CallKind::Deprovision)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl BackendAdapter for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn provision(
        &self,
        username: &Username,
        _credential: &Credential,
        _ctx: &ProvisionContext,
    ) -> Result<()> {
        self.log.record(&self.name, CallKind::Provision, username);
        self.pause().await;

        if self.fail_provision.load(Ordering::SeqCst) {
            return Err(Error::Backend(format!(
                "{}: injected provision failure for '{}'",
                self.name, username
            )));
        }

        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(username.to_string());
        Ok(())
    }

    async fn deprovision(&self, username: &Username) -> Result<()> {
        self.log.record(&self.name, CallKind::Deprovision, username);
        self.pause().await;

        if self.fail_deprovision.load(Ordering::SeqCst) {
            return Err(Error::Backend(format!(
                "{}: injected deprovision failure for '{}'",
                self.name, username
            )));
        }

        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(username.as_str());
        Ok(())
    }
}
