use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The interactive grant failed or produced no usable token. Not retried.
    #[error("Provider {provider} authentication failed: {code}: {description}")]
    AuthenticationFailed {
        provider: String,
        code: String,
        description: String,
    },

    #[error("Token refresh failed for {provider}: {message}")]
    RefreshFailed {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("No refresh token available for {provider}")]
    NoRefreshToken { provider: String },

    #[error("Stored credential for {provider} is corrupted: {reason}")]
    TokenCorrupted { provider: String, reason: String },

    #[error("OAuth state mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Serialization failed ({context}): {source}")]
    SerializationFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    #[error("Not authenticated with {provider}")]
    NotAuthenticated { provider: String },
}

impl AuthError {
    /// Whether a later attempt may succeed without user action
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshFailed { .. }
                | AuthError::NetworkError(_)
                | AuthError::SecureStorageUnavailable(_)
        )
    }

    /// Folds any grant failure into `AuthenticationFailed`.
    pub fn into_authentication_failure(self, provider: &str) -> AuthError {
        match self {
            AuthError::AuthenticationFailed { .. } => self,
            other => {
                let code = match &other {
                    AuthError::StateMismatch { .. } => "state_mismatch",
                    AuthError::NetworkError(_) => "network_error",
                    AuthError::InvalidConfig(_) => "invalid_config",
                    AuthError::SerializationFailed { .. } => "invalid_response",
                    _ => "grant_failed",
                };
                AuthError::AuthenticationFailed {
                    provider: provider.to_string(),
                    code: code.to_string(),
                    description: other.to_string(),
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
