//! Concrete adapters, one per access protocol.

pub mod dropbear;
pub mod htpasswd;
pub mod http;
pub mod squid;
pub mod ssh;
pub mod ssl;
pub mod udp;
pub mod websocket;
pub mod xray;

use std::path::Path;
use tokio::fs;

use vpsgate_common::Result;

pub use dropbear::DropbearBackend;
pub use http::HttpBackend;
pub use squid::SquidBackend;
pub use ssh::SshBackend;
pub use ssl::SslBackend;
pub use udp::UdpBackend;
pub use websocket::WebSocketBackend;
pub use xray::XrayBackend;

pub const SSH: &str = "ssh";
pub const XRAY: &str = "xray";
pub const SSL: &str = "ssl";
pub const WEBSOCKET: &str = "websocket";
pub const HTTP: &str = "http";
pub const SQUID: &str = "squid";
pub const UDP: &str = "udp";
pub const DROPBEAR: &str = "dropbear";

/// Saga order when no explicit list is configured.
///
/// `ssl` precedes `websocket`: the TLS server block references the
/// per-account certificate, which must already exist.
pub const CANONICAL_ORDER: [&str; 8] = [SSH, XRAY, SSL, WEBSOCKET, HTTP, SQUID, UDP, DROPBEAR];

/// Write a backend artifact atomically, creating parent directories.
///
/// `mode` is applied on unix before the file becomes visible.
pub(crate) async fn write_artifact(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_path);

    fs::write(&temp_path, contents).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Remove a backend artifact; a missing file counts as removed.
pub(crate) async fn remove_artifact(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_artifact_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/user.conf");

        write_artifact(&path, b"server {}", 0o644).await.unwrap();

        assert_eq!(fs::read(&path).await.unwrap(), b"server {}");
        assert!(!temp.path().join("nested/dir/user.conf.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_artifact_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("secret.json");
        write_artifact(&path, b"{}", 0o600).await.unwrap();

        let mode = fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_remove_missing_artifact_is_ok() {
        let temp = TempDir::new().unwrap();
        remove_artifact(&temp.path().join("gone.conf")).await.unwrap();
    }
}
