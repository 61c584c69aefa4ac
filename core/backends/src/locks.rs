//! Scoped exclusive access to shared backend artifacts.
//!
//! Several adapters rewrite files that hold every account at once (the xray
//! config, htpasswd files). Two updates of the same file must never
//! interleave their read-modify-write, even when the file is configured for
//! two different adapters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Per-path async locks, shared by all adapters built from one registry.
#[derive(Clone, Default)]
pub struct ArtifactLocks {
    inner: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ArtifactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to `path`.
    ///
    /// The guard releases the lock when dropped, including on error paths.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(path.to_path_buf()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
