use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Provider error: {0}")]
    Provider(#[from] BridgeError),

    /// A read or write failed mid-download. The partial file is left in place.
    #[error("Download to {} failed after {bytes_written} bytes: {message}", path.display())]
    DownloadIntegrity {
        path: PathBuf,
        bytes_written: u64,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// HTTP status of a rejected provider request
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Provider(e) => e.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
