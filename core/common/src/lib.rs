//! Common utilities and types shared across VpsGate crates.
//!
//! This crate provides the identity and credential types that flow through
//! every backend adapter, plus the shared error type.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Credential, Username};
