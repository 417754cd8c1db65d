//! Storage Abstractions
//!
//! Local file I/O, secure credential storage, and the capability surface a
//! remote storage provider exposes to the core.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::http::DownloadStream;

/// File system access trait
///
/// Abstracts the local file operations the core needs so tests and
/// sandboxed hosts can supply their own implementation.
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's data directory
    ///
    /// Suitable for persistent application data such as token files.
    async fn get_data_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating or truncating it
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Open a file for streaming writes, truncating any previous content
    async fn open_write_stream(&self, path: &Path)
        -> Result<Box<dyn AsyncWrite + Send + Unpin>>;
}

/// Secure credential storage trait
///
/// Keys are opaque strings chosen by the caller. Implementations decide
/// where the bytes live (a token file per key on desktop, memory in tests).
///
/// # Security Requirements
///
/// Implementations MUST never log or expose stored values.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("oauth_token", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key is not an error.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// List all secret keys (without values)
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// How the bytes of a [`RemoteFile`] are fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RetrievalHandle {
    /// Pre-authorized URL that can be fetched without credentials
    DirectUrl(String),
    /// Provider identifier that needs an authorized request or a metadata lookup
    FileId(String),
}

/// Provider-neutral description of a remote file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-assigned identifier, unique within the provider
    pub id: String,
    pub name: String,
    /// Size in bytes; `None` means unknown, not empty
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_ids: Vec<String>,
    pub web_url: Option<String>,
    pub handle: RetrievalHandle,
}

impl RemoteFile {
    /// Lowercased extension including the leading dot, e.g. `.mp4`
    pub fn extension(&self) -> Option<String> {
        let idx = self.name.rfind('.')?;
        Some(self.name[idx..].to_ascii_lowercase())
    }
}

/// Listing query understood by every [`StorageProvider`]
///
/// `parent` is the provider's container reference: a folder id for Drive,
/// a folder path for Graph. `None` selects the provider's configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub parent: Option<String>,
    pub mime_type: Option<String>,
}

impl ListQuery {
    pub fn in_folder(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Capability surface of a remote storage provider
///
/// Implementations attach a currently valid credential to every request.
/// Listings only ever return items that are children of the queried
/// container and not soft-deleted.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Short provider name used in logs and events
    fn name(&self) -> &'static str;

    /// Largest page size the provider accepts
    fn page_cap(&self) -> usize;

    /// Fetch one page of files
    ///
    /// Returns the page and the cursor for the next page of the same query,
    /// or `None` once enumeration is complete.
    async fn list_page(
        &self,
        query: &ListQuery,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<(Vec<RemoteFile>, Option<String>)>;

    /// Retrieve metadata for a single file
    async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile>;

    /// Open the byte stream behind a retrieval handle
    async fn open_download(&self, handle: &RetrievalHandle) -> Result<DownloadStream>;
}
