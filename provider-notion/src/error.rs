use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotionError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Error object returned by the API
    #[error("Notion API error (status {status}, {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The store does not offer the requested query mechanism
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Failed to parse Notion response: {0}")]
    ParseError(String),

    /// The paginated query was unavailable and the direct request failed too
    #[error("Paginated query failed ({primary}); direct request failed ({fallback})")]
    FallbackFailed {
        primary: Box<NotionError>,
        fallback: Box<NotionError>,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl NotionError {
    /// True when the paginated query endpoint itself is missing, as opposed
    /// to rejecting this particular request
    pub fn is_unavailable(&self) -> bool {
        match self {
            NotionError::Api { status, .. } => matches!(status, 404 | 405 | 501),
            NotionError::Unsupported(_) => true,
            _ => false,
        }
    }

    /// HTTP status of the last failed request
    pub fn status(&self) -> Option<u16> {
        match self {
            NotionError::Api { status, .. } => Some(*status),
            NotionError::FallbackFailed { fallback, .. } => fallback.status(),
            NotionError::Bridge(e) => e.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, NotionError>;
