//! # Transfer Module
//!
//! Provider-neutral listing and downloading on top of
//! `bridge_traits::storage::StorageProvider`.
//!
//! ## Components
//!
//! - **Pagination** (`pagination`): drains cursor-paginated result sets up to a limit
//! - **Chunked downloads** (`download`): streams a remote file to disk with progress
//! - **Extension filter** (`filter`): case-insensitive suffix matching
//! - **Storage adapter** (`adapter`): the facade combining the three per provider

pub mod adapter;
pub mod download;
pub mod error;
pub mod filter;
pub mod pagination;

pub use adapter::{FilterMode, StorageAdapter};
pub use download::{ChunkedDownloader, DownloadProgress, ProgressCallback, DEFAULT_CHUNK_SIZE};
pub use error::{Result, SyncError};
pub use filter::ExtensionFilter;
pub use pagination::{Page, PageRequest, PaginatedLister};
