//! Account records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vpsgate_common::Username;

/// One provisioned account.
///
/// `protocols` lists exactly the backends that were provisioned, in the
/// order they were provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: Username,
    /// Argon2id PHC string. Older databases call this field `password`.
    #[serde(alias = "password")]
    pub password_digest: String,
    pub expire_date: DateTime<Utc>,
    pub protocols: Vec<String>,
}

impl Account {
    pub fn new(
        username: Username,
        password_digest: String,
        expire_date: DateTime<Utc>,
        protocols: Vec<String>,
    ) -> Self {
        Self {
            username,
            password_digest,
            expire_date,
            protocols,
        }
    }

    /// Expired once the expiry instant has been reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_date <= now
    }
}
