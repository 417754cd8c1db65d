//! # Authentication Module
//!
//! Credential lifecycle for every remote provider.
//!
//! ## Overview
//!
//! [`CredentialManager`] guarantees that the credential it returns is valid
//! at the time of return. It reads and writes persisted credentials through
//! [`TokenStore`], renews them through the provider's [`AuthFlow`], and
//! reports lifecycle changes on the event bus.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization code flow with PKCE (Google Drive, OneDrive)
//! - Silent refresh ahead of expiry, full grant as fallback
//! - Static bearer tokens (Notion)
//! - Persistence via the host's `SecureStore`

pub mod error;
pub mod flow;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use flow::{AuthFlow, AuthorizationCallback, AuthorizationResponse, BearerTokenFlow, OAuthFlow};
pub use manager::{CredentialManager, TOKEN_REFRESH_BUFFER_SECS};
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
pub use token_store::TokenStore;
pub use types::{Credential, ProviderKind};
