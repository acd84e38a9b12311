//! Filesystem storage handler
//!
//! Each key is one file below the base directory. Keys may contain `/` to
//! form subdirectories. Files are written through a temporary sibling and
//! renamed into place, and are created with mode 0600 on unix since they
//! hold private key material.

use async_trait::async_trait;
use sshproxy_core::effects::StorageEffects;
use sshproxy_core::{ProxyError, ProxyResult};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Filesystem-based storage handler for production use
#[derive(Debug, Clone)]
pub struct FilesystemStorageHandler {
    /// Base directory for storage files
    base_path: PathBuf,
}

impl FilesystemStorageHandler {
    /// Storage rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory keys are stored under
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path a key is stored at, after validating the key
    pub fn path_for(&self, key: &str) -> ProxyResult<PathBuf> {
        if key.is_empty() {
            return Err(ProxyError::invalid("storage key cannot be empty"));
        }
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ProxyError::invalid(format!(
                "storage key '{key}' must be a relative path without '..'"
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

async fn write_private(path: &Path, value: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&tmp).await?;
    file.write_all(value).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path).await
}

#[async_trait]
impl StorageEffects for FilesystemStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> ProxyResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ProxyError::storage(format!("Failed to create directory: {e}"))
            })?;
        }
        write_private(&path, &value)
            .await
            .map_err(|e| ProxyError::storage(format!("Failed to write {}: {e}", path.display())))?;
        tracing::trace!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> ProxyResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProxyError::storage(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn remove(&self, key: &str) -> ProxyResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProxyError::storage(format!(
                "Failed to remove {}: {e}",
                path.display()
            ))),
        }
    }

    async fn exists(&self, key: &str) -> ProxyResult<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn store_retrieve_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path());

        assert_eq!(storage.retrieve("ssh/id_ed25519").await.unwrap(), None);
        storage
            .store("ssh/id_ed25519", b"secret".to_vec())
            .await
            .unwrap();
        assert!(dir.path().join("ssh/id_ed25519").exists());
        assert_eq!(
            storage.retrieve("ssh/id_ed25519").await.unwrap(),
            Some(b"secret".to_vec())
        );
        assert!(storage.exists("ssh/id_ed25519").await.unwrap());
        assert!(storage.remove("ssh/id_ed25519").await.unwrap());
        assert!(!storage.remove("ssh/id_ed25519").await.unwrap());
    }

    #[tokio::test]
    async fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path());
        storage.store("status", b"one".to_vec()).await.unwrap();
        storage.store("status", b"two".to_vec()).await.unwrap();
        assert_eq!(
            storage.retrieve("status").await.unwrap(),
            Some(b"two".to_vec())
        );
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let storage = FilesystemStorageHandler::new("/tmp/unused");
        assert_matches!(storage.path_for(""), Err(ProxyError::Invalid { .. }));
        assert_matches!(storage.path_for("../x"), Err(ProxyError::Invalid { .. }));
        assert_matches!(storage.path_for("/etc/passwd"), Err(ProxyError::Invalid { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorageHandler::new(dir.path());
        storage.store("key", b"x".to_vec()).await.unwrap();
        let mode = std::fs::metadata(dir.path().join("key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
