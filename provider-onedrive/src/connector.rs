//! Microsoft Graph connector for OneDrive
//!
//! Listings follow `@odata.nextLink`, with only its `$top` rewritten to the
//! size still needed. Downloads go through the
//! pre-authenticated `@microsoft.graph.downloadUrl`, which is fetched
//! without a bearer token.

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
use url::Url;

use crate::error::{OneDriveError, Result};
use crate::types::{DriveItem, DriveItemPage};

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Largest `$top` the connector sends
pub const MAX_PAGE_SIZE: usize = 200;

/// Default limit for [`OneDriveConnector::search_files`]
pub const DEFAULT_SEARCH_RESULTS: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OneDriveConnector {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<CredentialManager>,
    /// Folder listed when a query names no parent
    folder_path: String,
}

impl OneDriveConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<CredentialManager>,
        folder_path: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            credentials,
            folder_path: folder_path.into(),
        }
    }

    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    /// `root/children` for the drive root, `root:/{path}:/children` otherwise
    fn children_url(folder_path: &str, page_size: usize) -> String {
        let trimmed = folder_path.trim_matches('/');
        let base = if trimmed.is_empty() {
            format!("{}/me/drive/root/children", GRAPH_API_BASE)
        } else {
            let encoded: Vec<String> = trimmed
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect();
            format!("{}/me/drive/root:/{}:/children", GRAPH_API_BASE, encoded.join("/"))
        };
        format!("{}?$top={}", base, page_size)
    }

    fn item_url(file_id: &str) -> String {
        format!(
            "{}/me/drive/items/{}",
            GRAPH_API_BASE,
            urlencoding::encode(file_id)
        )
    }

    fn search_url(query: &str) -> String {
        // OData string literals escape a quote by doubling it.
        let literal = query.replace('\'', "''");
        format!(
            "{}/me/drive/root/search(q='{}')",
            GRAPH_API_BASE,
            urlencoding::encode(&literal)
        )
    }

    fn parse_timestamp(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        value
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| OneDriveError::ParseError(format!("invalid {}: {}", field, e)))
            })
            .transpose()
    }

    fn convert_item(item: DriveItem) -> Result<RemoteFile> {
        let handle = match &item.download_url {
            Some(url) => RetrievalHandle::DirectUrl(url.clone()),
            None => RetrievalHandle::FileId(item.id.clone()),
        };

        Ok(RemoteFile {
            created_at: Self::parse_timestamp("createdDateTime", item.created_date_time.as_deref())?,
            modified_at: Self::parse_timestamp(
                "lastModifiedDateTime",
                item.last_modified_date_time.as_deref(),
            )?,
            mime_type: item.file.and_then(|f| f.mime_type),
            parent_ids: item
                .parent_reference
                .and_then(|p| p.id)
                .into_iter()
                .collect(),
            id: item.id,
            name: item.name,
            size: item.size,
            web_url: item.web_url,
            handle,
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
            warn!(status = response.status, "Graph request failed");
            return Err(OneDriveError::ApiError {
                status: response.status,
                message: response.text_lossy(),
            });
        }

        debug!(status = response.status, "Graph request succeeded");
        serde_json::from_slice(&response.body)
            .map_err(|e| OneDriveError::ParseError(format!("unexpected response body: {}", e)))
    }

    fn resize_next_link(next_link: &str, top: usize) -> Result<String> {
        let mut url = Url::parse(next_link)
            .map_err(|e| OneDriveError::ParseError(format!("invalid nextLink: {}", e)))?;

        let top_param = format!("$top={}", top);
        let mut replaced = false;
        let mut params = Vec::new();
        for param in url.query().unwrap_or_default().split('&') {
            if param.is_empty() {
                continue;
            }
            if param.starts_with("$top=") || param.starts_with("%24top=") {
                replaced = true;
                params.push(top_param.clone());
            } else {
                params.push(param.to_string());
            }
        }
        if !replaced {
            params.push(top_param);
        }

        url.set_query(Some(&params.join("&")));
        Ok(url.into())
    }

    /// Fetch one page of a folder listing, files only.
    ///
    /// `cursor` is a previous page's `@odata.nextLink`. Its `$top` is replaced
    /// by `page_size`; every other parameter is sent unchanged.
    #[instrument(skip(self, cursor), fields(has_cursor = cursor.is_some()))]
    pub async fn list_folder_page(
        &self,
        folder_path: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let top = page_size.clamp(1, MAX_PAGE_SIZE);
        let url = match cursor {
            Some(next_link) => Self::resize_next_link(next_link, top)?,
            None => Self::children_url(folder_path, top),
        };

        let page: DriveItemPage = self.get_json(url).await?;
        let total = page.value.len();
        let files = page
            .value
            .into_iter()
            .filter(DriveItem::is_file)
            .map(Self::convert_item)
            .collect::<Result<Vec<_>>>()?;

        info!(count = files.len(), skipped = total - files.len(), "Listed files from OneDrive");
        Ok((files, page.next_link.filter(|link| !link.is_empty())))
    }

    /// Metadata for one item
    #[instrument(skip(self), fields(file_id = %file_id))]
    pub async fn get_file_info(&self, file_id: &str) -> Result<RemoteFile> {
        let item: DriveItem = self.get_json(Self::item_url(file_id)).await?;
        Self::convert_item(item)
    }

    /// Drive-wide search, folders excluded, truncated to `max_results`
    #[instrument(skip(self))]
    pub async fn search_files(&self, query: &str, max_results: usize) -> Result<Vec<RemoteFile>> {
        let page: DriveItemPage = self.get_json(Self::search_url(query)).await?;
        let files = page
            .value
            .into_iter()
            .filter(DriveItem::is_file)
            .take(max_results)
            .map(Self::convert_item)
            .collect::<Result<Vec<_>>>()?;

        info!(count = files.len(), "Search finished");
        Ok(files)
    }

    /// Resolve the pre-authenticated download URL of `file_id`
    #[instrument(skip(self), fields(file_id = %file_id))]
    pub async fn download_url(&self, file_id: &str) -> Result<String> {
        let item: DriveItem = self.get_json(Self::item_url(file_id)).await?;
        item.download_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| OneDriveError::DownloadUrlMissing {
                file_id: file_id.to_string(),
            })
    }

    async fn open_url(&self, url: String) -> Result<DownloadStream> {
        // The URL is pre-authenticated, no bearer token.
        let stream = self.http_client.download_stream(HttpRequest::get(url)).await?;
        info!(content_length = ?stream.content_length, "Opened download stream");
        Ok(stream)
    }
}

#[async_trait]
impl StorageProvider for OneDriveConnector {
    fn name(&self) -> &'static str {
        "onedrive"
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
        let folder_path = query.parent.as_deref().unwrap_or(&self.folder_path);
        let (mut files, next) = self
            .list_folder_page(folder_path, cursor.as_deref(), page_size)
            .await?;

        // Graph cannot filter children by mime type server-side.
        if let Some(mime_type) = query.mime_type.as_deref() {
            files.retain(|f| f.mime_type.as_deref() == Some(mime_type));
        }
        Ok((files, next))
    }

    async fn get_metadata(&self, file_id: &str) -> BridgeResult<RemoteFile> {
        Ok(self.get_file_info(file_id).await?)
    }

    async fn open_download(&self, handle: &RetrievalHandle) -> BridgeResult<DownloadStream> {
        let url = match handle {
            RetrievalHandle::DirectUrl(url) => url.clone(),
            RetrievalHandle::FileId(file_id) => self.download_url(file_id).await?,
        };
        Ok(self.open_url(url).await?)
    }
}
