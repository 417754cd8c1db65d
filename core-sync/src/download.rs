//! Chunked streaming downloads
//!
//! Copies a [`DownloadStream`] to a local file chunk by chunk, reporting
//! progress when the source announces its size. Reads and writes alternate;
//! there is no overlap between fetching and writing.

use crate::error::{Result, SyncError};
use bridge_traits::http::DownloadStream;
use bridge_traits::storage::FileSystemAccess;
use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

/// Default chunk size (10 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Progress of a download whose total size is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_written: u64,
    pub total_bytes: u64,
    /// 0-100, non-decreasing, 100 only once `total_bytes` were written
    pub percent: u8,
}

pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

pub struct ChunkedDownloader {
    file_system: Arc<dyn FileSystemAccess>,
    event_bus: Option<EventBus>,
    progress: Option<ProgressCallback>,
}

impl ChunkedDownloader {
    pub fn new(file_system: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            file_system,
            event_bus: None,
            progress: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Copy `source` into `destination` in chunks of at most `chunk_size`
    /// bytes and return the number of bytes written.
    ///
    /// The parent directory is created when missing. On failure the
    /// partially written file stays at `destination`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Config`] for a `chunk_size` of zero
    /// - [`SyncError::DownloadIntegrity`] for any read or write failure
    #[instrument(skip(self, source), fields(destination = %destination.display(), total_bytes = ?source.content_length))]
    pub async fn download(
        &self,
        source: DownloadStream,
        destination: &Path,
        chunk_size: usize,
    ) -> Result<u64> {
        if chunk_size == 0 {
            return Err(SyncError::Config(
                "download chunk size must be greater than zero".to_string(),
            ));
        }

        let total = source.content_length.filter(|&len| len > 0);
        self.emit(TransferEvent::DownloadStarted {
            destination: destination.display().to_string(),
            total_bytes: source.content_length,
        });

        let mut written = 0u64;
        match self
            .copy(source.reader, destination, chunk_size, total, &mut written)
            .await
        {
            Ok(()) => {
                info!(bytes_written = written, "Download completed");
                self.emit(TransferEvent::DownloadCompleted {
                    destination: destination.display().to_string(),
                    bytes_written: written,
                });
                Ok(written)
            }
            Err(message) => {
                warn!(bytes_written = written, error = %message, "Download failed");
                self.emit(TransferEvent::DownloadFailed {
                    destination: destination.display().to_string(),
                    bytes_written: written,
                    message: message.clone(),
                });
                Err(SyncError::DownloadIntegrity {
                    path: destination.to_path_buf(),
                    bytes_written: written,
                    message,
                })
            }
        }
    }

    async fn copy(
        &self,
        mut reader: Box<dyn AsyncRead + Send + Unpin>,
        destination: &Path,
        chunk_size: usize,
        total: Option<u64>,
        written: &mut u64,
    ) -> std::result::Result<(), String> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.file_system
                .create_dir_all(parent)
                .await
                .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
        }

        let mut writer = self
            .file_system
            .open_write_stream(destination)
            .await
            .map_err(|e| format!("cannot open destination: {}", e))?;

        let pumped = self
            .pump(&mut reader, &mut writer, destination, chunk_size, total, written)
            .await;
        // Flush even after a failure so the partial file holds every written chunk.
        let flushed = writer
            .flush()
            .await
            .map_err(|e| format!("flush failed: {}", e));
        let chunks = pumped?;
        flushed?;
        writer
            .shutdown()
            .await
            .map_err(|e| format!("close failed: {}", e))?;

        debug!(chunks, bytes_written = *written, "Copied source to destination");
        Ok(())
    }

    async fn pump(
        &self,
        reader: &mut Box<dyn AsyncRead + Send + Unpin>,
        writer: &mut Box<dyn AsyncWrite + Send + Unpin>,
        destination: &Path,
        chunk_size: usize,
        total: Option<u64>,
        written: &mut u64,
    ) -> std::result::Result<u64, String> {
        let mut buffer = vec![0u8; chunk_size];
        let mut last_percent = 0u8;
        let mut chunks = 0u64;

        loop {
            let filled = fill_chunk(reader, &mut buffer)
                .await
                .map_err(|e| format!("read failed: {}", e))?;
            if filled == 0 {
                return Ok(chunks);
            }

            writer
                .write_all(&buffer[..filled])
                .await
                .map_err(|e| format!("write failed: {}", e))?;
            *written += filled as u64;
            chunks += 1;

            if let Some(total) = total {
                let percent = percent_of(*written, total).max(last_percent);
                last_percent = percent;
                self.report(
                    destination,
                    DownloadProgress {
                        bytes_written: *written,
                        total_bytes: total,
                        percent,
                    },
                );
            }
        }
    }

    fn report(&self, destination: &Path, progress: DownloadProgress) {
        debug!(percent = progress.percent, bytes_written = progress.bytes_written, "Download progress");
        if let Some(callback) = &self.progress {
            callback(progress);
        }
        self.emit(TransferEvent::DownloadProgress {
            destination: destination.display().to_string(),
            bytes_written: progress.bytes_written,
            total_bytes: progress.total_bytes,
            percent: progress.percent,
        });
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Transfer(event));
        }
    }
}

impl fmt::Debug for ChunkedDownloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedDownloader")
            .field("has_event_bus", &self.event_bus.is_some())
            .field("has_progress_callback", &self.progress.is_some())
            .finish()
    }
}

/// Read until `buffer` is full or the source is exhausted.
async fn fill_chunk<R>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Percentage clamped to 99 until every announced byte has arrived
fn percent_of(written: u64, total: u64) -> u8 {
    if written >= total {
        100
    } else {
        ((written.saturating_mul(100) / total).min(99)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use std::io;
    use std::path::PathBuf;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("cloud-ingest-download-{}", uuid::Uuid::new_v4()))
    }

    fn source(data: Vec<u8>, announce: bool) -> DownloadStream {
        let len = data.len() as u64;
        DownloadStream::new(
            Box::new(io::Cursor::new(data)),
            if announce { Some(len) } else { None },
        )
    }

    fn recording_downloader(root: &Path) -> (ChunkedDownloader, Arc<Mutex<Vec<DownloadProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let downloader = ChunkedDownloader::new(Arc::new(TokioFileSystem::with_data_directory(
            root.to_path_buf(),
        )))
        .with_progress_callback(Arc::new(move |p| sink.lock().unwrap().push(p)));
        (downloader, seen)
    }

    /// Serves `good` bytes, then fails.
    struct BrokenReader {
        good: Option<Vec<u8>>,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.good.take() {
                Some(bytes) => {
                    buf.put_slice(&bytes);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset",
                ))),
            }
        }
    }

    #[test]
    fn test_percent_clamping() {
        assert_eq!(percent_of(0, 10), 0);
        assert_eq!(percent_of(999, 1000), 99);
        assert_eq!(percent_of(1000, 1000), 100);
        assert_eq!(percent_of(1500, 1000), 100);
    }

    #[tokio::test]
    async fn test_known_size_reports_progress_per_chunk() {
        let root = scratch_dir();
        let (downloader, seen) = recording_downloader(&root);
        let destination = root.join("nested").join("video.mp4");
        let data: Vec<u8> = (0..25u8).collect();

        let written = downloader
            .download(source(data.clone(), true), &destination, 10)
            .await
            .unwrap();

        assert_eq!(written, 25);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), data);
        let percents: Vec<u8> = seen.lock().unwrap().iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![40, 80, 100]);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_unknown_size_skips_progress() {
        let root = scratch_dir();
        let (downloader, seen) = recording_downloader(&root);
        let destination = root.join("out.bin");

        let written = downloader
            .download(source(vec![1; 64], false), &destination, 16)
            .await
            .unwrap();

        assert_eq!(written, 64);
        assert!(seen.lock().unwrap().is_empty());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let root = scratch_dir();
        let (downloader, _) = recording_downloader(&root);

        let err = downloader
            .download(source(vec![1], true), &root.join("x"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[tokio::test]
    async fn test_existing_directory_is_fine() {
        let root = scratch_dir();
        tokio::fs::create_dir_all(&root).await.unwrap();
        let (downloader, _) = recording_downloader(&root);

        let written = downloader
            .download(source(b"abc".to_vec(), true), &root.join("a.mp4"), 1024)
            .await
            .unwrap();
        assert_eq!(written, 3);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_read_failure_leaves_partial_file() {
        let root = scratch_dir();
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let downloader = ChunkedDownloader::new(Arc::new(TokioFileSystem::with_data_directory(
            root.clone(),
        )))
        .with_event_bus(bus);
        let destination = root.join("partial.mp4");
        let stream = DownloadStream::new(
            Box::new(BrokenReader {
                good: Some(vec![9; 4]),
            }),
            Some(100),
        );

        let err = downloader.download(stream, &destination, 4).await.unwrap_err();

        match err {
            SyncError::DownloadIntegrity {
                path,
                bytes_written,
                message,
            } => {
                assert_eq!(path, destination);
                assert_eq!(bytes_written, 4);
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), vec![9; 4]);

        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Transfer(TransferEvent::DownloadStarted { total_bytes: Some(100), .. })
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Transfer(TransferEvent::DownloadProgress { percent: 4, .. })
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Transfer(TransferEvent::DownloadFailed { bytes_written: 4, .. })
        ));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
