use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required setting or credential file is missing or invalid.
    /// Fatal at startup, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
