//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! secure storage, authorization callback, clock) and an [`IngestConfig`]
//! into ready-to-use provider components. Desktop apps typically enable the
//! `desktop-shims` feature, which depends on `bridge-desktop` and pulls in
//! every provider; other hosts pick providers with the `google-drive`,
//! `onedrive` and `notion` features and bring their own bridges.
//!
//! ```ignore
//! let config = IngestConfig::from_env()?;
//! let deps = CoreDependencies::desktop(&config)?
//!     .with_authorization_callback(Arc::new(BrowserCallback::default()));
//! let core = CoreService::new(&config, deps)?;
//!
//! let videos = core.google_drive().await?.list_video_files(&ListQuery::default()).await?;
//! let rows = core.notion()?.rows(None).await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient,
    storage::{FileSystemAccess, SecureStore},
    time::{Clock, SystemClock},
};
use core_auth::{AuthFlow, AuthorizationCallback, CredentialManager, ProviderKind, TokenStore};
use core_runtime::events::{EventBus, EventStream};
use core_runtime::IngestConfig;
use tracing::{debug, info, instrument};

#[cfg(any(feature = "google-drive", feature = "onedrive"))]
use bridge_traits::storage::StorageProvider;
#[cfg(any(feature = "google-drive", feature = "onedrive"))]
use core_auth::{OAuthConfig, OAuthFlow, OAuthFlowManager};
#[cfg(any(feature = "google-drive", feature = "onedrive"))]
use core_sync::{FilterMode, StorageAdapter};

#[cfg(feature = "google-drive")]
use provider_google_drive::GoogleDriveConnector;
#[cfg(feature = "notion")]
use provider_notion::{NotionClient, RecordTableReader};
#[cfg(feature = "onedrive")]
use provider_onedrive::OneDriveConnector;

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
use bridge_desktop::{FileSecureStore, ReqwestHttpClient, TokioFileSystem};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub filesystem: Arc<dyn FileSystemAccess>,
    /// Completes interactive OAuth grants; `None` on hosts that only use
    /// persisted credentials or bearer tokens
    pub authorization_callback: Option<Arc<dyn AuthorizationCallback>>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: EventBus,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles, with the
    /// system clock and a fresh event bus.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        filesystem: Arc<dyn FileSystemAccess>,
    ) -> Self {
        Self {
            http_client,
            secure_store,
            filesystem,
            authorization_callback: None,
            clock: Arc::new(SystemClock),
            event_bus: EventBus::default(),
        }
    }

    pub fn with_authorization_callback(mut self, callback: Arc<dyn AuthorizationCallback>) -> Self {
        self.authorization_callback = Some(callback);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Desktop bridges: `reqwest`, `tokio::fs` and token files under the
    /// platform data directory, with each configured provider's token pinned
    /// to its `token_path`.
    #[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
    pub fn desktop(config: &IngestConfig) -> Result<Self> {
        let mut tokens = FileSecureStore::in_data_dir();
        for provider in [ProviderKind::GoogleDrive, ProviderKind::OneDrive] {
            if let Some(path) = config.token_path(provider.as_str()) {
                tokens = tokens.with_path(TokenStore::key_for(provider), path.to_path_buf());
            }
        }

        Ok(Self::new(
            Arc::new(ReqwestHttpClient::new()?),
            Arc::new(tokens),
            Arc::new(TokioFileSystem::new()),
        ))
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<IngestConfig>,
    deps: Arc<CoreDependencies>,
}

impl CoreService {
    /// Validate `config` and bind it to the provided dependencies.
    pub fn new(config: &IngestConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;
        info!(
            google_drive = config.google_drive.is_some(),
            onedrive = config.onedrive.is_some(),
            notion = config.notion.is_some(),
            "Core service initialized"
        );
        Ok(Self {
            config: Arc::new(config.clone()),
            deps: Arc::new(deps),
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    /// Auth and transfer events from every component this service builds
    pub fn events(&self) -> EventStream {
        EventStream::new(self.deps.event_bus.subscribe())
    }

    fn credential_manager(&self, flow: Arc<dyn AuthFlow>) -> Arc<CredentialManager> {
        Arc::new(CredentialManager::new(
            flow,
            TokenStore::new(Arc::clone(&self.deps.secure_store)),
            Arc::clone(&self.deps.clock),
            self.deps.event_bus.clone(),
        ))
    }

    #[cfg(any(feature = "google-drive", feature = "onedrive"))]
    fn oauth_flow(&self, config: OAuthConfig) -> Result<Arc<dyn AuthFlow>> {
        let provider = config.provider;
        let callback = self.deps.authorization_callback.clone().ok_or_else(|| {
            CoreError::CapabilityMissing {
                capability: "authorization_callback".to_string(),
                message: format!("{} requires an OAuth authorization callback", provider),
            }
        })?;
        let manager = OAuthFlowManager::new(
            config,
            Arc::clone(&self.deps.http_client),
            Arc::clone(&self.deps.clock),
        );
        Ok(Arc::new(OAuthFlow::new(manager, callback)))
    }

    #[cfg(any(feature = "google-drive", feature = "onedrive"))]
    fn storage_adapter(&self, provider: Arc<dyn StorageProvider>, mode: FilterMode) -> StorageAdapter {
        StorageAdapter::new(provider, Arc::clone(&self.deps.filesystem))
            .with_config(&self.config)
            .with_event_bus(self.deps.event_bus.clone())
            .with_filter_mode(mode)
    }

    /// Google Drive connector for the configured folder.
    ///
    /// Reads the client secrets file through the host filesystem.
    #[cfg(feature = "google-drive")]
    #[instrument(skip(self))]
    pub async fn google_drive_connector(&self) -> Result<Arc<GoogleDriveConnector>> {
        let settings = self
            .config
            .google_drive
            .as_ref()
            .ok_or(CoreError::NotConfigured {
                provider: ProviderKind::GoogleDrive.as_str(),
            })?;

        let secrets = self.deps.filesystem.read_file(&settings.credentials_path).await?;
        let oauth = OAuthConfig::from_google_client_secrets(&secrets)?;
        let credentials = self.credential_manager(self.oauth_flow(oauth)?);

        debug!(folder_id = %settings.folder_id, "Built Google Drive connector");
        Ok(Arc::new(GoogleDriveConnector::new(
            Arc::clone(&self.deps.http_client),
            credentials,
            settings.folder_id.clone(),
        )))
    }

    /// Listing and download over Google Drive. Listings truncate to
    /// `max_list_results` before the extension filter runs.
    #[cfg(feature = "google-drive")]
    pub async fn google_drive(&self) -> Result<StorageAdapter> {
        let connector = self.google_drive_connector().await?;
        Ok(self.storage_adapter(connector, FilterMode::AfterLimit))
    }

    #[cfg(feature = "onedrive")]
    #[instrument(skip(self))]
    pub fn onedrive_connector(&self) -> Result<Arc<OneDriveConnector>> {
        let settings = self
            .config
            .onedrive
            .as_ref()
            .ok_or(CoreError::NotConfigured {
                provider: ProviderKind::OneDrive.as_str(),
            })?;

        let oauth = OAuthConfig::onedrive(
            settings.client_id.clone(),
            Some(settings.client_secret.clone()),
            &settings.tenant_id,
        );
        let credentials = self.credential_manager(self.oauth_flow(oauth)?);

        debug!(folder_path = %settings.folder_path, "Built OneDrive connector");
        Ok(Arc::new(OneDriveConnector::new(
            Arc::clone(&self.deps.http_client),
            credentials,
            settings.folder_path.clone(),
        )))
    }

    /// Listing and download over OneDrive. The extension filter runs on
    /// every page.
    #[cfg(feature = "onedrive")]
    pub fn onedrive(&self) -> Result<StorageAdapter> {
        let connector = self.onedrive_connector()?;
        Ok(self.storage_adapter(connector, FilterMode::PerPage))
    }

    #[cfg(feature = "notion")]
    #[instrument(skip(self))]
    pub fn notion_client(&self) -> Result<Arc<NotionClient>> {
        let settings = self
            .config
            .notion
            .as_ref()
            .ok_or(CoreError::NotConfigured {
                provider: ProviderKind::Notion.as_str(),
            })?;

        let flow = Arc::new(core_auth::BearerTokenFlow::notion(settings.api_key.clone()));
        let credentials = self.credential_manager(flow);

        debug!(database_id = %settings.database_id, "Built Notion client");
        Ok(Arc::new(NotionClient::new(
            Arc::clone(&self.deps.http_client),
            credentials,
            settings.database_id.clone(),
        )))
    }

    /// Row reader over the configured Notion database, capped at
    /// `max_list_results` records.
    #[cfg(feature = "notion")]
    pub fn notion(&self) -> Result<RecordTableReader> {
        let client = self.notion_client()?;
        Ok(RecordTableReader::new(client).with_max_items(self.config.max_list_results))
    }
}
