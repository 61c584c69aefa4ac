//! Provisioning orchestrator for VpsGate.
//!
//! Drives the multi-backend saga: an account is provisioned on every
//! configured backend in order, or on none of them. Removal tears down every
//! recorded backend on a best-effort basis.
//!
//! # Design Principles
//! - One saga at a time: the registry guard is held from the duplicate check
//!   until the registry is persisted
//! - A record lists exactly the backends that were provisioned
//! - Secrets are hashed before any side effect and never logged

pub mod config;
pub mod error;
pub mod manager;

pub use config::ManagerConfig;
pub use error::{
    BackendFailure, OrchestratorError, PersistenceError, ProvisionFailure, RemovalReport, Result,
};
pub use manager::{AddOutcome, Orchestrator, AUDIT_TARGET};
