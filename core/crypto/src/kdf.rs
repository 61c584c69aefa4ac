//! Credential digests using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use vpsgate_common::{Credential, Error, Result};

/// Parameters for Argon2id hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 19456 = 19 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Parameters suitable for interactive use.
    ///
    /// Matches the OWASP baseline for Argon2id.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }

    /// Higher cost parameters for hosts with memory to spare.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Minimal parameters, only for tests.
    pub fn testing() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Hash a credential into a self-describing PHC string.
///
/// # Postconditions
/// - Returns `$argon2id$v=19$m=..,t=..,p=..$<salt>$<hash>`
/// - Two calls with the same credential yield different digests (random salt)
///
/// # Errors
/// - Returns error if Argon2id parameters are invalid
///
/// # Security
/// - The credential is not stored or logged
pub fn hash_credential(credential: &Credential, params: &KdfParams) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = params
        .hasher()?
        .hash_password(credential.expose().as_bytes(), &salt)
        .map_err(|e| Error::Crypto(format!("Credential hashing failed: {}", e)))?;
    Ok(digest.to_string())
}

/// Verify a credential against a stored PHC digest.
///
/// Parameters and salt are read from the digest itself, so digests created
/// with older parameters keep verifying.
///
/// # Returns
/// - `Ok(true)` if the credential matches
/// - `Ok(false)` if it does not
///
/// # Errors
/// - Returns error if the stored digest is malformed
pub fn verify_credential(credential: &Credential, digest: &str) -> Result<bool> {
    let parsed = PasswordHash::new(digest)
        .map_err(|e| Error::Crypto(format!("Malformed credential digest: {}", e)))?;

    match Argon2::default().verify_password(credential.expose().as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::Crypto(format!("Credential verification failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(secret: &str) -> Credential {
        Credential::new(secret).unwrap()
    }

    #[test]
    fn test_digest_is_phc_argon2id() {
        let digest = hash_credential(&credential("secure-password"), &KdfParams::testing()).unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(!digest.contains("secure-password"));
    }

    #[test]
    fn test_digest_salted() {
        let secret = credential("secure-password");
        let params = KdfParams::testing();

        let first = hash_credential(&secret, &params).unwrap();
        let second = hash_credential(&secret, &params).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_credential() {
        let digest = hash_credential(&credential("secure-password"), &KdfParams::testing()).unwrap();

        assert!(verify_credential(&credential("secure-password"), &digest).unwrap());
        assert!(!verify_credential(&credential("wrong-password"), &digest).unwrap());
    }

    #[test]
    fn test_verify_malformed_digest_fails() {
        assert!(verify_credential(&credential("secure-password"), "not-a-digest").is_err());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KdfParams {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 0,
        };
        assert!(hash_credential(&credential("secure-password"), &params).is_err());
    }
}
