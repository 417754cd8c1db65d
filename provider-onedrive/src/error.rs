use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OneDriveError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Graph API request failed with status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Download URL not found in file metadata")]
    DownloadUrlMissing { file_id: String },

    #[error("Failed to parse Graph response: {0}")]
    ParseError(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, OneDriveError>;

impl From<OneDriveError> for BridgeError {
    fn from(error: OneDriveError) -> Self {
        match error {
            OneDriveError::ApiError { status, message } => {
                BridgeError::RequestFailed { status, message }
            }
            OneDriveError::DownloadUrlMissing { file_id } => BridgeError::NotFound(format!(
                "Download URL not found in file metadata for {}",
                file_id
            )),
            OneDriveError::Bridge(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
