//! In-memory account collection backed by one JSON file.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::account::Account;
use vpsgate_common::{Error, Result, Username};

/// Ordered account records plus the file they persist to.
///
/// Mutations only touch memory; call [`AccountRegistry::save`] to make them
/// durable.
#[derive(Debug)]
pub struct AccountRegistry {
    path: PathBuf,
    accounts: Vec<Account>,
}

impl AccountRegistry {
    /// Empty registry persisting to `path`. Nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            accounts: Vec::new(),
        }
    }

    /// Load the registry stored at `path`.
    ///
    /// A missing file yields an empty registry.
    ///
    /// # Errors
    /// - The file cannot be read
    /// - The file is not a JSON array of valid accounts
    /// - The file lists the same username twice
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no registry file, starting empty");
                return Ok(Self::new(path));
            }
            Err(e) => return Err(e.into()),
        };

        let accounts: Vec<Account> = serde_json::from_slice(&data).map_err(|e| {
            Error::Serialization(format!("{}: {}", path.display(), e))
        })?;

        let mut registry = Self::new(path);
        for account in accounts {
            registry.add(account)?;
        }
        debug!(
            path = %registry.path.display(),
            accounts = registry.accounts.len(),
            "loaded registry"
        );
        Ok(registry)
    }

    /// Persist all records.
    ///
    /// Writes a sibling temp file, syncs it, then renames it over the
    /// target, so readers see either the old or the new file.
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = serde_json::to_vec_pretty(&self.accounts)?;

        let mut temp_path = self.path.as_os_str().to_owned();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&temp_path, &self.path).await?;
        debug!(path = %self.path.display(), accounts = self.accounts.len(), "saved registry");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record.
    ///
    /// # Errors
    /// - A record with the same username exists
    pub fn add(&mut self, account: Account) -> Result<()> {
        if self.contains(&account.username) {
            return Err(Error::AlreadyExists(format!(
                "account '{}' already exists",
                account.username
            )));
        }
        self.accounts.push(account);
        Ok(())
    }

    /// Drop the record for `username`, returning it if present.
    pub fn remove(&mut self, username: &Username) -> Option<Account> {
        let index = self.accounts.iter().position(|a| &a.username == username)?;
        Some(self.accounts.remove(index))
    }

    pub fn find(&self, username: &Username) -> Option<&Account> {
        self.accounts.iter().find(|a| &a.username == username)
    }

    pub fn contains(&self, username: &Username) -> bool {
        self.find(username).is_some()
    }

    /// All records in insertion order.
    pub fn list(&self) -> &[Account] {
        &self.accounts
    }

    /// Usernames whose expiry is at or before `now`, in insertion order.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<Username> {
        self.accounts
            .iter()
            .filter(|a| a.is_expired(now))
            .map(|a| a.username.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn account(name: &str, expire_date: DateTime<Utc>) -> Account {
        Account::new(
            Username::new(name).unwrap(),
            format!("$argon2id$v=19$m=1024,t=1,p=1$c2FsdA${}", name),
            expire_date,
            vec!["ssh".to_string(), "xray".to_string()],
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_add_find_remove() {
        let mut registry = AccountRegistry::new("/nonexistent/users.json");
        registry.add(account("alice", now())).unwrap();
        registry.add(account("bob", now())).unwrap();

        let alice = Username::new("alice").unwrap();
        assert_eq!(registry.find(&alice).unwrap().protocols, vec!["ssh", "xray"]);
        assert_eq!(registry.len(), 2);

        let removed = registry.remove(&alice).unwrap();
        assert_eq!(removed.username, alice);
        assert!(registry.find(&alice).is_none());
        assert!(registry.remove(&alice).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_add_keeps_first_record() {
        let mut registry = AccountRegistry::new("/nonexistent/users.json");
        registry.add(account("alice", now())).unwrap();

        let result = registry.add(account("alice", now() + Duration::days(30)));
        assert!(matches!(result, Err(Error::AlreadyExists(_))));

        let alice = Username::new("alice").unwrap();
        assert_eq!(registry.find(&alice).unwrap().expire_date, now());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_keeps_insertion_order() {
        let mut registry = AccountRegistry::new("/nonexistent/users.json");
        for name in ["zed", "alice", "mike"] {
            registry.add(account(name, now())).unwrap();
        }
        let names: Vec<&str> = registry.list().iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["zed", "alice", "mike"]);
    }

    #[test]
    fn test_expired_selects_due_accounts() {
        let mut registry = AccountRegistry::new("/nonexistent/users.json");
        registry.add(account("old", now() - Duration::days(1))).unwrap();
        registry.add(account("edge", now())).unwrap();
        registry.add(account("fresh", now() + Duration::days(365))).unwrap();

        let expired: Vec<String> = registry.expired(now()).iter().map(|u| u.to_string()).collect();
        assert_eq!(expired, vec!["old", "edge"]);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let registry = AccountRegistry::load(temp.path().join("users.json")).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db/users.json");

        let mut registry = AccountRegistry::new(&path);
        registry.add(account("carol", now() + Duration::nanoseconds(42))).unwrap();
        registry.add(account("alice", now() - Duration::days(3))).unwrap();
        registry.save().await.unwrap();

        let loaded = AccountRegistry::load(&path).await.unwrap();
        assert_eq!(loaded.list(), registry.list());
        assert!(!temp.path().join("db/users.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.json");

        let mut registry = AccountRegistry::new(&path);
        registry.add(account("alice", now())).unwrap();
        registry.save().await.unwrap();
        registry.remove(&Username::new("alice").unwrap());
        registry.save().await.unwrap();

        let loaded = AccountRegistry::load(&path).await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = AccountRegistry::load(&path).await;
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_usernames() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.json");
        let records = vec![account("alice", now()), account("alice", now())];
        std::fs::write(&path, serde_json::to_vec(&records).unwrap()).unwrap();

        let result = AccountRegistry::load(&path).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_save_into_unwritable_location_fails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        // Parent "directory" is a regular file.
        let registry = AccountRegistry::new(blocker.join("users.json"));
        assert!(registry.save().await.is_err());
    }
}
