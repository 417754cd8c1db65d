//! # Host Bridge Traits
//!
//! Capability traits the core consumes and each host must implement.
//!
//! ## Overview
//!
//! The core never talks to the network, the filesystem, or a credential
//! vault directly. It goes through the traits in this crate so that the
//! desktop implementation (`bridge-desktop`) can be swapped for mocks in
//! tests or for another host's adapters.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP request/response and body streaming
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local file I/O for downloads
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence
//! - [`StorageProvider`](storage::StorageProvider) - Remote file listing, metadata and retrieval
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Remote
//! non-2xx answers keep their status in [`BridgeError::RequestFailed`] so
//! callers can tell a rejected request from a broken transport.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{DownloadStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{
    FileSystemAccess, ListQuery, RemoteFile, RetrievalHandle, SecureStore, StorageProvider,
};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
