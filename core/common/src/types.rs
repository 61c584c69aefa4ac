//! Common types used throughout VpsGate.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum username length accepted by `useradd`.
pub const MAX_USERNAME_LEN: usize = 32;

/// Account identity, shared by every backend.
///
/// Usernames end up in process arguments and file names, so only the
/// portable POSIX subset is accepted: a lowercase letter or underscore,
/// followed by lowercase letters, digits, underscores or hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Create a new Username from a string.
    ///
    /// # Errors
    /// - Returns error if the name is empty, too long, or contains
    ///   characters outside `[a-z0-9_-]` (first character `[a-z_]`)
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }
        if name.len() > MAX_USERNAME_LEN {
            return Err(crate::Error::InvalidInput(format!(
                "Username cannot exceed {} characters",
                MAX_USERNAME_LEN
            )));
        }

        let mut chars = name.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
        let rest_ok =
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !first_ok || !rest_ok {
            return Err(crate::Error::InvalidInput(format!(
                "Invalid username '{}': use lowercase letters, digits, '_' or '-'",
                name
            )));
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Virtual host for this account under the given domain suffix.
    pub fn virtual_host(&self, domain: &str) -> String {
        format!("{}.{}", self.0, domain)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

/// Account secret handed to backends at provisioning time.
///
/// Never persisted; the registry only keeps a digest. The buffer is
/// zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    /// Create a new credential.
    ///
    /// # Errors
    /// - Returns error if empty
    /// - Returns error if it contains ':' or a line break, which would
    ///   corrupt `chpasswd` and htpasswd input lines
    pub fn new(secret: impl Into<String>) -> crate::Result<Self> {
        let secret = Self(secret.into());
        if secret.0.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Password cannot be empty".to_string(),
            ));
        }
        if secret.0.contains(':') || secret.0.contains('\n') || secret.0.contains('\r') {
            return Err(crate::Error::InvalidInput(
                "Password cannot contain ':' or line breaks".to_string(),
            ));
        }
        Ok(secret)
    }

    /// Expose the secret for handing to a backend.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Get the length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential([REDACTED; {} bytes])", self.0.len())
    }
}
