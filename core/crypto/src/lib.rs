//! Credential digests for VpsGate.
//!
//! Account passwords are handed to the backends in clear text exactly once,
//! at provisioning time. The registry only ever stores an Argon2id digest
//! in PHC string format, which embeds its own salt and parameters.

pub mod kdf;

pub use kdf::{hash_credential, verify_credential, KdfParams};
