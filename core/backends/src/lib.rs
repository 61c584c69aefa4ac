//! Backend adapters for VpsGate.
//!
//! Every access protocol (SSH, xray, TLS certificates, WebSocket tunnel,
//! HTTP basic-auth proxy, squid, UDP tunnel, dropbear) is wrapped behind the
//! [`BackendAdapter`] trait so the orchestrator can drive them uniformly.
//!
//! # Design Principles
//! - Adapter isolation: no saga or registry logic in adapters
//! - Shell steps go through [`CommandRunner`] so tests can script them
//! - Shared artifacts are only rewritten under an [`ArtifactLocks`] guard

pub mod backend;
pub mod command;
pub mod config;
pub mod locks;
pub mod memory;
pub mod protocols;
pub mod registry;

pub use backend::{BackendAdapter, ProvisionContext};
pub use command::{CommandOutput, CommandRunner, TokioCommandRunner};
pub use config::ProtocolConfig;
pub use locks::ArtifactLocks;
pub use memory::{BackendCall, CallKind, CallLog, MemoryBackend};
pub use registry::{create_default_registry, BackendContext, BackendFactory, BackendRegistry};
