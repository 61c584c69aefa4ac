//! One-shot expiry sweep.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use vpsgate_common::Username;
use vpsgate_orchestrator::{Orchestrator, OrchestratorError};

/// An expired account whose removal reported an error.
#[derive(Debug)]
pub struct SweepFailure {
    pub username: Username,
    pub error: OrchestratorError,
}

/// What one sweep did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Every expired account a removal was attempted for, in registry order.
    pub attempted: Vec<Username>,
    /// The subset whose removal returned an error.
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Removes expired accounts.
#[derive(Clone)]
pub struct ExpirySweeper {
    orchestrator: Arc<Orchestrator>,
}

impl ExpirySweeper {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Remove every account expired at `now`.
    ///
    /// Continues past individual failures. An account that vanished between
    /// the scan and its removal counts as attempted, not failed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let expired = self.orchestrator.expired(now).await;
        let mut report = SweepReport::default();

        for username in expired {
            debug!(%username, "removing expired account");
            match self.orchestrator.remove_account(&username).await {
                Ok(()) | Err(OrchestratorError::NotFound(_)) => {}
                Err(error) => {
                    warn!(%username, %error, "expired account removal incomplete");
                    report.failed.push(SweepFailure {
                        username: username.clone(),
                        error,
                    });
                }
            }
            report.attempted.push(username);
        }

        if !report.attempted.is_empty() {
            info!(
                attempted = report.attempted.len(),
                failed = report.failed.len(),
                "expiry sweep finished"
            );
        }
        report
    }
}
