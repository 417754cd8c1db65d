//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with body streaming through `tokio-util`
//! - `FileSystemAccess` using `tokio::fs`
//! - `SecureStore` as one token file per key ([`FileSecureStore`]) or
//!   process memory ([`MemorySecureStore`])
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileSecureStore, ReqwestHttpClient, TokioFileSystem};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let fs = TokioFileSystem::new();
//! let tokens = FileSecureStore::in_data_dir()
//!     .with_path("oauth_tokens:onedrive", "onedrive_token.json");
//! ```

mod filesystem;
mod http;
mod secure_store;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use secure_store::{FileSecureStore, MemorySecureStore};
