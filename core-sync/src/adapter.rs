//! Provider-neutral listing and download facade
//!
//! [`StorageAdapter`] composes a [`StorageProvider`] with the
//! [`PaginatedLister`] and the [`ChunkedDownloader`], so every provider gets
//! the same limits, filtering and progress reporting.

use crate::download::{ChunkedDownloader, ProgressCallback, DEFAULT_CHUNK_SIZE};
use crate::error::{Result, SyncError};
use crate::filter::ExtensionFilter;
use crate::pagination::{Page, PageRequest, PaginatedLister};
use bridge_traits::storage::{FileSystemAccess, ListQuery, RemoteFile, StorageProvider};
use core_runtime::config::{IngestConfig, DEFAULT_MAX_LIST_RESULTS};
use core_runtime::events::EventBus;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// When extension filtering happens relative to the result limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Collect up to the limit, then filter. The result may be shorter than
    /// the limit even when more matching files exist.
    #[default]
    AfterLimit,
    /// Filter every page as it arrives; only matches count toward the limit.
    PerPage,
}

pub struct StorageAdapter {
    provider: Arc<dyn StorageProvider>,
    lister: PaginatedLister,
    downloader: ChunkedDownloader,
    max_results: usize,
    chunk_size: usize,
    video_filter: ExtensionFilter,
    filter_mode: FilterMode,
}

impl StorageAdapter {
    pub fn new(provider: Arc<dyn StorageProvider>, file_system: Arc<dyn FileSystemAccess>) -> Self {
        let lister = PaginatedLister::new(provider.page_cap());
        Self {
            provider,
            lister,
            downloader: ChunkedDownloader::new(file_system),
            max_results: DEFAULT_MAX_LIST_RESULTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            video_filter: ExtensionFilter::video(),
            filter_mode: FilterMode::default(),
        }
    }

    /// Apply the shared limits from `config`
    pub fn with_config(self, config: &IngestConfig) -> Self {
        self.with_max_results(config.max_list_results)
            .with_chunk_size(config.download_chunk_size)
            .with_video_extensions(&config.video_extensions)
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.downloader = self.downloader.with_event_bus(event_bus);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.downloader = self.downloader.with_progress_callback(callback);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_video_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.video_filter = ExtensionFilter::new(extensions);
        self
    }

    pub fn with_filter_mode(mut self, filter_mode: FilterMode) -> Self {
        self.filter_mode = filter_mode;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn video_filter(&self) -> &ExtensionFilter {
        &self.video_filter
    }

    /// List files matching `query`, in provider order.
    ///
    /// At most `max_results` files are returned, falling back to the
    /// configured limit when `None`.
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn list_files(
        &self,
        query: &ListQuery,
        max_results: Option<usize>,
    ) -> Result<Vec<RemoteFile>> {
        let max = max_results.unwrap_or(self.max_results);
        let provider = &self.provider;

        let files = self
            .lister
            .drain(
                |request: PageRequest| async move {
                    let (items, next) = provider
                        .list_page(query, request.cursor, request.page_size)
                        .await?;
                    Ok::<_, SyncError>(Page::new(items, next))
                },
                max,
            )
            .await?;

        info!(count = files.len(), "Listed files");
        Ok(files)
    }

    /// List files whose name ends with one of the filter's extensions.
    ///
    /// How the limit interacts with the filter depends on [`FilterMode`].
    #[instrument(skip(self, filter), fields(provider = self.provider.name(), mode = ?self.filter_mode))]
    pub async fn list_by_extension(
        &self,
        query: &ListQuery,
        filter: &ExtensionFilter,
        max_results: Option<usize>,
    ) -> Result<Vec<RemoteFile>> {
        let max = max_results.unwrap_or(self.max_results);

        let files = match self.filter_mode {
            FilterMode::AfterLimit => {
                let listed = self.list_files(query, Some(max)).await?;
                let total = listed.len();
                let kept = filter.apply(listed);
                debug!(total, kept = kept.len(), "Filtered listing");
                kept
            }
            FilterMode::PerPage => {
                let provider = &self.provider;
                self.lister
                    .drain_filtered(
                        |request: PageRequest| async move {
                            let (items, next) = provider
                                .list_page(query, request.cursor, request.page_size)
                                .await?;
                            Ok::<_, SyncError>(Page::new(items, next))
                        },
                        |file: &RemoteFile| filter.matches(file),
                        max,
                    )
                    .await?
            }
        };

        info!(count = files.len(), "Listed files by extension");
        Ok(files)
    }

    /// [`list_by_extension`](Self::list_by_extension) with the configured
    /// video extensions
    pub async fn list_video_files(&self, query: &ListQuery) -> Result<Vec<RemoteFile>> {
        self.list_by_extension(query, &self.video_filter, None).await
    }

    pub async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile> {
        Ok(self.provider.get_metadata(file_id).await?)
    }

    /// Stream `file` to `destination` and return the bytes written
    #[instrument(skip(self, file), fields(provider = self.provider.name(), file_id = %file.id))]
    pub async fn download(&self, file: &RemoteFile, destination: &Path) -> Result<u64> {
        let stream = self.provider.open_download(&file.handle).await?;
        self.downloader
            .download(stream, destination, self.chunk_size)
            .await
    }

    /// Resolve `file_id` through a metadata lookup, then download it
    pub async fn download_by_id(&self, file_id: &str, destination: &Path) -> Result<u64> {
        let file = self.get_metadata(file_id).await?;
        self.download(&file, destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::TokioFileSystem;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::DownloadStream;
    use bridge_traits::storage::RetrievalHandle;
    use bridge_traits::BridgeError;
    use mockall::mock;
    use mockall::predicate::*;
    use std::path::PathBuf;

    mock! {
        Provider {}

        #[async_trait]
        impl StorageProvider for Provider {
            fn name(&self) -> &'static str;
            fn page_cap(&self) -> usize;
            async fn list_page(
                &self,
                query: &ListQuery,
                cursor: Option<String>,
                page_size: usize,
            ) -> BridgeResult<(Vec<RemoteFile>, Option<String>)>;
            async fn get_metadata(&self, file_id: &str) -> BridgeResult<RemoteFile>;
            async fn open_download(&self, handle: &RetrievalHandle) -> BridgeResult<DownloadStream>;
        }
    }

    fn file(id: &str, name: &str) -> RemoteFile {
        RemoteFile {
            id: id.to_string(),
            name: name.to_string(),
            size: None,
            mime_type: None,
            created_at: None,
            modified_at: None,
            parent_ids: Vec::new(),
            web_url: None,
            handle: RetrievalHandle::FileId(id.to_string()),
        }
    }

    fn provider(page_cap: usize) -> MockProvider {
        let mut provider = MockProvider::new();
        provider.expect_name().return_const("mock");
        provider.expect_page_cap().return_const(page_cap);
        provider
    }

    fn adapter(provider: MockProvider) -> StorageAdapter {
        StorageAdapter::new(Arc::new(provider), Arc::new(TokioFileSystem::new()))
    }

    /// Two pages: [a.mp4, b.txt] then [c.txt, d.mkv]
    fn two_pages(provider: &mut MockProvider) {
        provider
            .expect_list_page()
            .withf(|_, cursor, _| cursor.is_none())
            .returning(|_, _, _| {
                Ok((
                    vec![file("1", "a.mp4"), file("2", "b.txt")],
                    Some("page-2".to_string()),
                ))
            });
        provider
            .expect_list_page()
            .withf(|_, cursor, _| cursor.as_deref() == Some("page-2"))
            .returning(|_, _, _| Ok((vec![file("3", "c.txt"), file("4", "d.mkv")], None)));
    }

    fn ids(files: &[RemoteFile]) -> Vec<&str> {
        files.iter().map(|f| f.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_list_files_follows_cursor() {
        let mut provider = provider(2);
        two_pages(&mut provider);

        let files = adapter(provider)
            .list_files(&ListQuery::in_folder("root"), None)
            .await
            .unwrap();

        assert_eq!(ids(&files), vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_list_files_requests_at_most_remaining() {
        let mut provider = provider(100);
        provider
            .expect_list_page()
            .with(always(), eq(None::<String>), eq(3))
            .times(1)
            .returning(|_, _, _| {
                Ok((
                    vec![file("1", "a"), file("2", "b"), file("3", "c")],
                    Some("more".to_string()),
                ))
            });

        let files = adapter(provider)
            .list_files(&ListQuery::default(), Some(3))
            .await
            .unwrap();

        assert_eq!(files.len(), 3);
    }

    #[tokio::test]
    async fn test_after_limit_filters_truncated_listing() {
        let mut provider = provider(2);
        provider
            .expect_list_page()
            .withf(|_, cursor, _| cursor.is_none())
            .times(1)
            .returning(|_, _, _| {
                Ok((
                    vec![file("1", "a.mp4"), file("2", "b.txt")],
                    Some("page-2".to_string()),
                ))
            });

        let files = adapter(provider)
            .list_by_extension(&ListQuery::default(), &ExtensionFilter::video(), Some(2))
            .await
            .unwrap();

        assert_eq!(ids(&files), vec!["1"]);
    }

    #[tokio::test]
    async fn test_per_page_counts_only_matches() {
        let mut provider = provider(2);
        two_pages(&mut provider);

        let files = adapter(provider)
            .with_filter_mode(FilterMode::PerPage)
            .list_by_extension(&ListQuery::default(), &ExtensionFilter::video(), Some(2))
            .await
            .unwrap();

        assert_eq!(ids(&files), vec!["1", "4"]);
    }

    #[tokio::test]
    async fn test_list_video_files_uses_configured_extensions() {
        let mut provider = provider(2);
        two_pages(&mut provider);

        let files = adapter(provider)
            .with_video_extensions(["TXT"])
            .list_video_files(&ListQuery::default())
            .await
            .unwrap();

        assert_eq!(ids(&files), vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_provider_error_is_propagated() {
        let mut provider = provider(10);
        provider.expect_list_page().returning(|_, _, _| {
            Err(BridgeError::RequestFailed {
                status: 403,
                message: "forbidden".to_string(),
            })
        });

        let err = adapter(provider)
            .list_files(&ListQuery::default(), None)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_download_by_id_resolves_metadata() {
        let root: PathBuf =
            std::env::temp_dir().join(format!("cloud-ingest-adapter-{}", uuid::Uuid::new_v4()));
        let destination = root.join("clip.mp4");

        let mut provider = provider(10);
        provider
            .expect_get_metadata()
            .with(eq("42"))
            .times(1)
            .returning(|_| {
                let mut meta = file("42", "clip.mp4");
                meta.handle = RetrievalHandle::DirectUrl("https://dl.example/clip".to_string());
                Ok(meta)
            });
        provider
            .expect_open_download()
            .withf(|handle| matches!(handle, RetrievalHandle::DirectUrl(url) if url == "https://dl.example/clip"))
            .times(1)
            .returning(|_| {
                Ok(DownloadStream::new(
                    Box::new(std::io::Cursor::new(b"video-bytes".to_vec())),
                    Some(11),
                ))
            });

        let written = adapter(provider)
            .with_chunk_size(4)
            .download_by_id("42", &destination)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"video-bytes");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
