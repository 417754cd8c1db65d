//! Google Drive API connector implementation
//!
//! Implements the `StorageProvider` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{DownloadStream, HttpClient, HttpRequest};
use bridge_traits::storage::{ListQuery, RemoteFile, RetrievalHandle, StorageProvider};
use chrono::{DateTime, Utc};
use core_auth::CredentialManager;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{GoogleDriveError, Result};
use crate::types::{DriveFile, FilesListResponse};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Largest page size requested from files.list
pub const MAX_PAGE_SIZE: usize = 100;

/// Fields requested for listings
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size, createdTime, modifiedTime)";

/// Fields requested for single-file metadata
const FILE_FIELDS: &str = "id, name, mimeType, size, createdTime, modifiedTime, parents, webViewLink";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Drive API connector
///
/// Every request carries a bearer token obtained from the
/// [`CredentialManager`], which refreshes it ahead of expiry.
///
/// # Features
///
/// - Folder listing with optional server-side mime filtering
/// - Single-file metadata with parents and web view link
/// - Streaming downloads through `files/{id}?alt=media`
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::{ListQuery, StorageProvider};
///
/// let connector = GoogleDriveConnector::new(http_client, credentials, "folder-id");
/// let (files, next_cursor) = connector.list_page(&ListQuery::default(), None, 100).await?;
/// ```
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<CredentialManager>,
    /// Folder listed when a query names no parent
    folder_id: String,
}

impl GoogleDriveConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<CredentialManager>,
        folder_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            credentials,
            folder_id: folder_id.into(),
        }
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    /// Drive search expression for the direct, non-trashed children of a folder
    fn build_query(folder_id: &str, mime_type: Option<&str>) -> String {
        let mut query = format!(
            "'{}' in parents and trashed=false",
            escape_literal(folder_id)
        );
        if let Some(mime_type) = mime_type {
            query.push_str(&format!(" and mimeType='{}'", escape_literal(mime_type)));
        }
        query
    }

    fn list_url(query: &str, page_size: usize, cursor: Option<&str>) -> String {
        let mut url = format!(
            "{}/files?q={}&pageSize={}&fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(query),
            page_size,
            urlencoding::encode(LIST_FIELDS)
        );
        if let Some(page_token) = cursor {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(page_token)));
        }
        url
    }

    /// Parse RFC 3339 timestamp
    fn parse_timestamp(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        value
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| GoogleDriveError::ParseError(format!("invalid {}: {}", field, e)))
            })
            .transpose()
    }

    /// Convert DriveFile to RemoteFile
    fn convert_file(drive_file: DriveFile) -> Result<RemoteFile> {
        let size = drive_file
            .size
            .as_deref()
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    GoogleDriveError::ParseError(format!(
                        "invalid size {:?} for file {}",
                        raw, drive_file.id
                    ))
                })
            })
            .transpose()?;

        Ok(RemoteFile {
            size,
            created_at: Self::parse_timestamp("createdTime", drive_file.created_time.as_deref())?,
            modified_at: Self::parse_timestamp(
                "modifiedTime",
                drive_file.modified_time.as_deref(),
            )?,
            handle: RetrievalHandle::FileId(drive_file.id.clone()),
            id: drive_file.id,
            name: drive_file.name,
            mime_type: drive_file.mime_type,
            parent_ids: drive_file.parents,
            web_url: drive_file.web_view_link,
        })
    }

    /// Authorized GET, decoded as JSON
    #[instrument(skip(self), fields(url = %url))]
    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let token = self.credentials.access_token().await?;
        let request = HttpRequest::get(url)
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "API request failed");
            return Err(GoogleDriveError::ApiError {
                status_code: response.status,
                message: response.text_lossy(),
            });
        }

        debug!(status = response.status, "API request succeeded");
        serde_json::from_slice(&response.body)
            .map_err(|e| GoogleDriveError::ParseError(format!("unexpected response body: {}", e)))
    }

    /// Fetch one page of a folder listing
    #[instrument(skip(self, cursor), fields(has_cursor = cursor.is_some()))]
    pub async fn list_folder_page(
        &self,
        folder_id: &str,
        mime_type: Option<&str>,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let query = Self::build_query(folder_id, mime_type);
        let url = Self::list_url(&query, page_size, cursor);

        let response: FilesListResponse = self.get_json(url).await?;
        let files = response
            .files
            .into_iter()
            .map(Self::convert_file)
            .collect::<Result<Vec<_>>>()?;

        info!(count = files.len(), "Listed files from Google Drive");
        Ok((files, response.next_page_token.filter(|t| !t.is_empty())))
    }

    /// Metadata for one file, including parents and web view link
    #[instrument(skip(self), fields(file_id = %file_id))]
    pub async fn get_file_info(&self, file_id: &str) -> Result<RemoteFile> {
        let url = format!(
            "{}/files/{}?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(file_id),
            urlencoding::encode(FILE_FIELDS)
        );
        let drive_file: DriveFile = self.get_json(url).await?;
        Self::convert_file(drive_file)
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn open_media(&self, file_id: &str) -> Result<DownloadStream> {
        let token = self.credentials.access_token().await?;
        let url = format!(
            "{}/files/{}?alt=media",
            DRIVE_API_BASE,
            urlencoding::encode(file_id)
        );

        let stream = self
            .http_client
            .download_stream(HttpRequest::get(url).bearer_token(token))
            .await?;
        info!(content_length = ?stream.content_length, "Opened media stream");
        Ok(stream)
    }
}

/// Escape a value embedded in a single-quoted Drive query literal
fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl StorageProvider for GoogleDriveConnector {
    fn name(&self) -> &'static str {
        "google_drive"
    }

    fn page_cap(&self) -> usize {
        MAX_PAGE_SIZE
    }

    async fn list_page(
        &self,
        query: &ListQuery,
        cursor: Option<String>,
        page_size: usize,
    ) -> BridgeResult<(Vec<RemoteFile>, Option<String>)> {
        let folder_id = query.parent.as_deref().unwrap_or(&self.folder_id);
        Ok(self
            .list_folder_page(
                folder_id,
                query.mime_type.as_deref(),
                cursor.as_deref(),
                page_size,
            )
            .await?)
    }

    async fn get_metadata(&self, file_id: &str) -> BridgeResult<RemoteFile> {
        Ok(self.get_file_info(file_id).await?)
    }

    async fn open_download(&self, handle: &RetrievalHandle) -> BridgeResult<DownloadStream> {
        match handle {
            RetrievalHandle::FileId(file_id) => Ok(self.open_media(file_id).await?),
            RetrievalHandle::DirectUrl(url) => {
                self.http_client
                    .download_stream(HttpRequest::get(url.clone()))
                    .await
            }
        }
    }
}
