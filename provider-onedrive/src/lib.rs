//! # OneDrive Provider
//!
//! Implements `StorageProvider` trait for Microsoft Graph API (OneDrive).
//!
//! ## Overview
//!
//! This module provides:
//! - Folder listing by path, files only, following `@odata.nextLink`
//! - Drive-wide search
//! - Downloads through pre-authenticated download URLs

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{OneDriveConnector, DEFAULT_SEARCH_RESULTS, MAX_PAGE_SIZE};
pub use error::{OneDriveError, Result};
