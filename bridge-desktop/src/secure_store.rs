//! Credential Storage backed by token files
//!
//! Each secret lives in its own file. Keys can be pinned to an explicit
//! path (the configured token file of a provider); other keys land in the
//! store's root directory under a percent-encoded file name.

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::SecureStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

const SECRET_EXTENSION: &str = "secret";

/// File-per-key secure store
///
/// Writes restrict permissions to the current user on Unix. Concurrent
/// writers to the same file follow last-writer-wins.
pub struct FileSecureStore {
    root: PathBuf,
    pinned: HashMap<String, PathBuf>,
}

impl FileSecureStore {
    /// Store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pinned: HashMap::new(),
        }
    }

    /// Store rooted at the platform data directory
    pub fn in_data_dir() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cloud-ingest")
            .join("tokens");
        Self::new(root)
    }

    /// Pin `key` to an explicit file path
    pub fn with_path(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.pinned.insert(key.into(), path.into());
        self
    }

    /// File that backs `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        match self.pinned.get(key) {
            Some(path) => path.clone(),
            None => self
                .root
                .join(format!("{}.{}", urlencoding::encode(key), SECRET_EXTENSION)),
        }
    }

    async fn write_restricted(path: &Path, value: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, value).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        Self::write_restricted(&path, value).await?;
        debug!(key = key, path = ?path, "Stored secret");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = key, "Secret not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = key, "Deleted secret");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for (key, path) in &self.pinned {
            if fs::try_exists(path).await? {
                keys.push(key.clone());
            }
        }

        if fs::try_exists(&self.root).await? {
            let mut entries = fs::read_dir(&self.root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(SECRET_EXTENSION) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if let Ok(key) = urlencoding::decode(stem) {
                    let key = key.into_owned();
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Process-local secure store
///
/// Holds credentials that must not be written to disk, such as an
/// integration token taken from configuration.
#[derive(Default)]
pub struct MemorySecureStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.data.lock().await.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.data.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.data.lock().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
