//! # Google Drive Provider
//!
//! Implements `StorageProvider` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Folder listing limited to direct, non-trashed children
//! - Optional server-side mime filtering
//! - Single-file metadata with parents and web view link
//! - Streaming downloads with bearer authentication

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{GoogleDriveConnector, MAX_PAGE_SIZE};
pub use error::{GoogleDriveError, Result};
