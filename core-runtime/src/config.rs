//! # Core Configuration Module
//!
//! The single configuration value threaded through every component.
//!
//! ## Overview
//!
//! `IngestConfig` is constructed once at startup, either explicitly through
//! [`IngestConfig::builder`] or from process environment variables through
//! [`IngestConfig::from_env`], and then passed by reference into the
//! constructors that need it. No component reads the environment itself.
//!
//! Each provider section is optional. A section that is present is
//! validated fail-fast: every problem found is collected into one
//! [`Error::Config`] so the operator sees them all at once.
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `GOOGLE_DRIVE_CREDENTIALS_PATH` | `credentials.json` |
//! | `GOOGLE_DRIVE_FOLDER_ID` | required |
//! | `GOOGLE_DRIVE_TOKEN_PATH` | `token.json` |
//! | `ONEDRIVE_CLIENT_ID` / `ONEDRIVE_CLIENT_SECRET` / `ONEDRIVE_TENANT_ID` | required |
//! | `ONEDRIVE_FOLDER_PATH` | `/Videos` |
//! | `ONEDRIVE_TOKEN_PATH` | `onedrive_token.json` |
//! | `NOTION_API_KEY` / `NOTION_DATABASE_ID` | required |
//! | `INGEST_DOWNLOAD_CHUNK_SIZE` | `10485760` |
//! | `INGEST_MAX_RESULTS` | `1000` |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{IngestConfig, NotionSettings};
//!
//! let config = IngestConfig::builder()
//!     .notion(NotionSettings::new("secret_abc", "db-123"))
//!     .max_list_results(500)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// 10 MiB, the chunk size used when none is configured.
pub const DEFAULT_DOWNLOAD_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Upper bound on listing results when the caller does not pick one.
pub const DEFAULT_MAX_LIST_RESULTS: usize = 1000;

/// Extensions treated as video files by the storage adapters.
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 6] = [".mp4", ".avi", ".mov", ".mkv", ".flv", ".wmv"];

const DEFAULT_GOOGLE_CREDENTIALS_PATH: &str = "credentials.json";
const DEFAULT_GOOGLE_TOKEN_PATH: &str = "token.json";
const DEFAULT_ONEDRIVE_FOLDER_PATH: &str = "/Videos";
const DEFAULT_ONEDRIVE_TOKEN_PATH: &str = "onedrive_token.json";

/// Google Drive connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleDriveSettings {
    /// OAuth client secrets file downloaded from the Google console
    pub credentials_path: PathBuf,
    /// Folder listed when a query names no parent
    pub folder_id: String,
    /// Where the credential is persisted between runs
    pub token_path: PathBuf,
}

impl GoogleDriveSettings {
    pub fn new(folder_id: impl Into<String>) -> Self {
        Self {
            credentials_path: PathBuf::from(DEFAULT_GOOGLE_CREDENTIALS_PATH),
            folder_id: folder_id.into(),
            token_path: PathBuf::from(DEFAULT_GOOGLE_TOKEN_PATH),
        }
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.folder_id.trim().is_empty() {
            errors.push("GOOGLE_DRIVE_FOLDER_ID is not set".to_string());
        }
        if !self.credentials_path.exists() {
            errors.push(format!(
                "Credentials file not found: {}",
                self.credentials_path.display()
            ));
        }
        errors
    }

    pub fn validate(&self) -> Result<()> {
        into_result("Google Drive", self.problems())
    }
}

/// OneDrive (Microsoft Graph) connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct OneDriveSettings {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    /// Folder path listed when a query names no parent, e.g. `/Videos/CCTV`
    pub folder_path: String,
    pub token_path: PathBuf,
}

impl OneDriveSettings {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant_id: tenant_id.into(),
            folder_path: DEFAULT_ONEDRIVE_FOLDER_PATH.to_string(),
            token_path: PathBuf::from(DEFAULT_ONEDRIVE_TOKEN_PATH),
        }
    }

    pub fn with_folder_path(mut self, path: impl Into<String>) -> Self {
        self.folder_path = path.into();
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Authority URL for the configured tenant
    pub fn authority(&self) -> String {
        format!("https://login.microsoftonline.com/{}", self.tenant_id)
    }

    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.client_id.trim().is_empty() {
            errors.push("ONEDRIVE_CLIENT_ID is not set".to_string());
        }
        if self.client_secret.trim().is_empty() {
            errors.push("ONEDRIVE_CLIENT_SECRET is not set".to_string());
        }
        if self.tenant_id.trim().is_empty() {
            errors.push("ONEDRIVE_TENANT_ID is not set".to_string());
        }
        errors
    }

    pub fn validate(&self) -> Result<()> {
        into_result("OneDrive", self.problems())
    }
}

impl fmt::Debug for OneDriveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneDriveSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("folder_path", &self.folder_path)
            .field("token_path", &self.token_path)
            .finish()
    }
}

/// Notion integration settings
#[derive(Clone, PartialEq, Eq)]
pub struct NotionSettings {
    /// Integration token, sent as a bearer credential
    pub api_key: String,
    pub database_id: String,
}

impl NotionSettings {
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            database_id: database_id.into(),
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.api_key.trim().is_empty() {
            errors.push("NOTION_API_KEY is not set".to_string());
        }
        if self.database_id.trim().is_empty() {
            errors.push("NOTION_DATABASE_ID is not set".to_string());
        }
        errors
    }

    pub fn validate(&self) -> Result<()> {
        into_result("Notion", self.problems())
    }
}

impl fmt::Debug for NotionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionSettings")
            .field("api_key", &"[REDACTED]")
            .field("database_id", &self.database_id)
            .finish()
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub google_drive: Option<GoogleDriveSettings>,
    pub onedrive: Option<OneDriveSettings>,
    pub notion: Option<NotionSettings>,
    /// Bytes read per chunk by the downloader
    pub download_chunk_size: usize,
    /// Cap applied to listings and record queries that do not pass one
    pub max_list_results: usize,
    pub video_extensions: Vec<String>,
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    ///
    /// A provider section is created when any of its variables is set; the
    /// section is then validated like an explicitly built one.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        let google_vars = [
            "GOOGLE_DRIVE_CREDENTIALS_PATH",
            "GOOGLE_DRIVE_FOLDER_ID",
            "GOOGLE_DRIVE_TOKEN_PATH",
        ];
        if google_vars.iter().any(|name| var(name).is_some()) {
            let mut settings = GoogleDriveSettings::new(var("GOOGLE_DRIVE_FOLDER_ID").unwrap_or_default());
            if let Some(path) = var("GOOGLE_DRIVE_CREDENTIALS_PATH") {
                settings = settings.with_credentials_path(path);
            }
            if let Some(path) = var("GOOGLE_DRIVE_TOKEN_PATH") {
                settings = settings.with_token_path(path);
            }
            builder = builder.google_drive(settings);
        }

        let onedrive_vars = [
            "ONEDRIVE_CLIENT_ID",
            "ONEDRIVE_CLIENT_SECRET",
            "ONEDRIVE_TENANT_ID",
            "ONEDRIVE_FOLDER_PATH",
            "ONEDRIVE_TOKEN_PATH",
        ];
        if onedrive_vars.iter().any(|name| var(name).is_some()) {
            let mut settings = OneDriveSettings::new(
                var("ONEDRIVE_CLIENT_ID").unwrap_or_default(),
                var("ONEDRIVE_CLIENT_SECRET").unwrap_or_default(),
                var("ONEDRIVE_TENANT_ID").unwrap_or_default(),
            );
            if let Some(path) = var("ONEDRIVE_FOLDER_PATH") {
                settings = settings.with_folder_path(path);
            }
            if let Some(path) = var("ONEDRIVE_TOKEN_PATH") {
                settings = settings.with_token_path(path);
            }
            builder = builder.onedrive(settings);
        }

        if var("NOTION_API_KEY").is_some() || var("NOTION_DATABASE_ID").is_some() {
            builder = builder.notion(NotionSettings::new(
                var("NOTION_API_KEY").unwrap_or_default(),
                var("NOTION_DATABASE_ID").unwrap_or_default(),
            ));
        }

        if let Some(raw) = var("INGEST_DOWNLOAD_CHUNK_SIZE") {
            builder = builder.download_chunk_size(parse_number("INGEST_DOWNLOAD_CHUNK_SIZE", &raw)?);
        }
        if let Some(raw) = var("INGEST_MAX_RESULTS") {
            builder = builder.max_list_results(parse_number("INGEST_MAX_RESULTS", &raw)?);
        }

        builder.build()
    }

    /// Validate every configured section, reporting all problems together
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(settings) = &self.google_drive {
            errors.extend(settings.problems());
        }
        if let Some(settings) = &self.onedrive {
            errors.extend(settings.problems());
        }
        if let Some(settings) = &self.notion {
            errors.extend(settings.problems());
        }
        if self.download_chunk_size == 0 {
            errors.push("Download chunk size must be greater than 0".to_string());
        }
        if self.max_list_results == 0 {
            errors.push("Maximum list results must be greater than 0".to_string());
        }
        if self.video_extensions.is_empty() {
            errors.push("At least one video extension is required".to_string());
        }

        into_result("Ingest", errors)
    }

    /// Token file configured for a provider key, if that provider is configured
    pub fn token_path(&self, provider_key: &str) -> Option<&Path> {
        match provider_key {
            "google_drive" => self.google_drive.as_ref().map(|s| s.token_path.as_path()),
            "onedrive" => self.onedrive.as_ref().map(|s| s.token_path.as_path()),
            _ => None,
        }
    }
}

/// Builder for [`IngestConfig`]
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    google_drive: Option<GoogleDriveSettings>,
    onedrive: Option<OneDriveSettings>,
    notion: Option<NotionSettings>,
    download_chunk_size: Option<usize>,
    max_list_results: Option<usize>,
    video_extensions: Option<Vec<String>>,
}

impl IngestConfigBuilder {
    pub fn google_drive(mut self, settings: GoogleDriveSettings) -> Self {
        self.google_drive = Some(settings);
        self
    }

    pub fn onedrive(mut self, settings: OneDriveSettings) -> Self {
        self.onedrive = Some(settings);
        self
    }

    pub fn notion(mut self, settings: NotionSettings) -> Self {
        self.notion = Some(settings);
        self
    }

    pub fn download_chunk_size(mut self, bytes: usize) -> Self {
        self.download_chunk_size = Some(bytes);
        self
    }

    pub fn max_list_results(mut self, max: usize) -> Self {
        self.max_list_results = Some(max);
        self
    }

    /// Replace the default video extension set. Entries are normalized to
    /// lowercase with a leading dot.
    pub fn video_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.video_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| ext.len() > 1)
                .collect(),
        );
        self
    }

    pub fn build(self) -> Result<IngestConfig> {
        let config = IngestConfig {
            google_drive: self.google_drive,
            onedrive: self.onedrive,
            notion: self.notion,
            download_chunk_size: self
                .download_chunk_size
                .unwrap_or(DEFAULT_DOWNLOAD_CHUNK_SIZE),
            max_list_results: self.max_list_results.unwrap_or(DEFAULT_MAX_LIST_RESULTS),
            video_extensions: self.video_extensions.unwrap_or_else(|| {
                DEFAULT_VIDEO_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect()
            }),
        };

        config.validate()?;
        Ok(config)
    }
}

/// `MP4` and `.mp4` both become `.mp4`
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn parse_number(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a positive integer, got '{}'", name, raw)))
}

fn into_result(scope: &str, errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }

    let details: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
    Err(Error::Config(format!(
        "{} configuration errors:\n{}",
        scope,
        details.join("\n")
    )))
}
