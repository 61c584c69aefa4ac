//! Durable account registry for VpsGate.
//!
//! Holds the ordered account records and persists them as a single JSON
//! array. Saga logic lives in the orchestrator; this crate only stores what
//! it is told to store.

pub mod account;
pub mod store;

pub use account::Account;
pub use store::AccountRegistry;
