//! # Credential Manager
//!
//! Hands out a valid access credential for one provider, refreshing or
//! re-granting it when needed.
//!
//! ## Acquisition order
//!
//! 1. The in-memory credential, if still valid.
//! 2. The persisted credential, if still valid.
//! 3. A silent refresh, when a refresh token is available.
//! 4. A full grant through the provider's [`AuthFlow`].
//!
//! Every credential obtained in steps 3 and 4 is persisted before it is
//! returned. Flows whose [`AuthFlow::persists`] is `false` skip step 2 and
//! are never written to storage. Validity always includes a refresh buffer, so a token about to
//! expire is renewed before it is handed out.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{BearerTokenFlow, CredentialManager, TokenStore};
//! use core_runtime::events::EventBus;
//! use bridge_traits::time::SystemClock;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let manager = CredentialManager::new(
//!     Arc::new(BearerTokenFlow::notion("secret_abc")),
//!     TokenStore::new(secure_store),
//!     Arc::new(SystemClock),
//!     EventBus::default(),
//! );
//!
//! let credential = manager.acquire().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::flow::AuthFlow;
use crate::token_store::TokenStore;
use crate::types::{Credential, ProviderKind};
use bridge_traits::time::Clock;
use chrono::Duration;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

/// Tokens expiring within this window are renewed before use (5 minutes)
pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Owns the credential lifecycle of one provider.
///
/// The cache sits behind an `RwLock`; renewals are serialized by a separate
/// mutex so concurrent callers trigger at most one refresh or grant.
pub struct CredentialManager {
    flow: Arc<dyn AuthFlow>,
    token_store: TokenStore,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    refresh_buffer: Duration,
    cached: RwLock<Option<Credential>>,
    renewal: Mutex<()>,
}

impl CredentialManager {
    pub fn new(
        flow: Arc<dyn AuthFlow>,
        token_store: TokenStore,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            flow,
            token_store,
            clock,
            event_bus,
            refresh_buffer: Duration::seconds(TOKEN_REFRESH_BUFFER_SECS),
            cached: RwLock::new(None),
            renewal: Mutex::new(()),
        }
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.flow.provider()
    }

    /// Return a credential that is valid now.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthenticationFailed`] when the full grant fails. This
    ///   is final and not retried here.
    /// - [`AuthError::SecureStorageUnavailable`] when the token store cannot
    ///   be read or written.
    #[instrument(skip(self), fields(provider = %self.provider()))]
    pub async fn acquire(&self) -> Result<Credential> {
        if let Some(credential) = self.cached_if_valid().await {
            return Ok(credential);
        }

        let _renewal = self.renewal.lock().await;
        // Another caller may have renewed while this one waited.
        if let Some(credential) = self.cached_if_valid().await {
            return Ok(credential);
        }

        if !self.flow.persists() {
            return self.grant().await;
        }

        let stored = self.token_store.load(self.provider()).await?;
        if let Some(credential) = stored.as_ref().filter(|c| self.is_valid(c)) {
            debug!("Using persisted credential");
            self.set_cache(credential.clone()).await;
            return Ok(credential.clone());
        }

        if let Some(stale) = stored.as_ref().filter(|c| c.can_refresh()) {
            match self.refresh(stale).await {
                Ok(credential) => return Ok(credential),
                Err(e) => warn!(error = %e, "Silent refresh failed, falling back to full grant"),
            }
        }

        self.grant().await
    }

    /// Access token of a valid credential
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.acquire().await?.access_token)
    }

    /// Cached or persisted credential, without any network access.
    ///
    /// The result may be expired.
    pub async fn current(&self) -> Result<Option<Credential>> {
        if let Some(credential) = self.cached.read().await.clone() {
            return Ok(Some(credential));
        }
        if !self.flow.persists() {
            return Ok(None);
        }
        self.token_store.load(self.provider()).await
    }

    /// Drop the in-memory credential so the next `acquire` re-reads storage.
    ///
    /// Used after the remote side rejected a token that still looked valid.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    /// Delete the persisted credential and clear the cache.
    #[instrument(skip(self), fields(provider = %self.provider()))]
    pub async fn sign_out(&self) -> Result<()> {
        let _renewal = self.renewal.lock().await;
        self.token_store.delete(self.provider()).await?;
        *self.cached.write().await = None;

        info!("Signed out");
        self.emit(AuthEvent::SignedOut {
            provider: self.provider_key(),
        });
        Ok(())
    }

    async fn refresh(&self, stale: &Credential) -> Result<Credential> {
        info!("Credential expired or expiring soon, refreshing");
        self.emit(AuthEvent::TokenRefreshing {
            provider: self.provider_key(),
        });

        let credential = match self.flow.refresh(stale).await {
            Ok(credential) => credential,
            Err(e) => {
                self.emit(AuthEvent::AuthError {
                    provider: self.provider_key(),
                    message: format!("Token refresh failed: {}", e),
                    recoverable: true,
                });
                return Err(e);
            }
        };

        self.persist(&credential).await?;
        self.emit(AuthEvent::TokenRefreshed {
            provider: self.provider_key(),
            expires_at: credential.expires_at_timestamp(),
        });
        info!("Credential refreshed");
        Ok(credential)
    }

    async fn grant(&self) -> Result<Credential> {
        info!("Starting full grant");
        let provider = self.provider_key();

        let granted = self
            .flow
            .grant()
            .await
            .and_then(|credential| {
                if credential.access_token.is_empty() {
                    Err(AuthError::AuthenticationFailed {
                        provider: provider.clone(),
                        code: "empty_token".to_string(),
                        description: "grant returned no access token".to_string(),
                    })
                } else {
                    Ok(credential)
                }
            })
            .map_err(|e| e.into_authentication_failure(&provider));

        let credential = match granted {
            Ok(credential) => credential,
            Err(e) => {
                error!(error = %e, "Authentication failed");
                self.emit(AuthEvent::AuthError {
                    provider,
                    message: e.to_string(),
                    recoverable: false,
                });
                return Err(e);
            }
        };

        self.persist(&credential).await?;
        self.emit(AuthEvent::SignedIn { provider });
        info!("Signed in");
        Ok(credential)
    }

    async fn persist(&self, credential: &Credential) -> Result<()> {
        if self.flow.persists() {
            self.token_store.store(credential).await?;
        }
        self.set_cache(credential.clone()).await;
        Ok(())
    }

    async fn cached_if_valid(&self) -> Option<Credential> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|c| self.is_valid(c))
            .cloned()
    }

    async fn set_cache(&self, credential: Credential) {
        *self.cached.write().await = Some(credential);
    }

    fn is_valid(&self, credential: &Credential) -> bool {
        credential.is_valid_at(self.clock.now(), self.refresh_buffer)
    }

    fn provider_key(&self) -> String {
        self.provider().as_str().to_string()
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::storage::SecureStore;
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex as TokioMutex;

    struct MockSecureStore {
        storage: TokioMutex<HashMap<String, Vec<u8>>>,
    }

    impl MockSecureStore {
        fn new() -> Self {
            Self {
                storage: TokioMutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.storage.lock().await.remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.storage.lock().await.keys().cloned().collect())
        }
    }

    mock! {
        Flow {}

        #[async_trait]
        impl AuthFlow for Flow {
            fn provider(&self) -> ProviderKind;
            async fn refresh(&self, credential: &Credential) -> Result<Credential>;
            async fn grant(&self) -> Result<Credential>;
        }
    }

    struct TestClock(StdMutex<DateTime<Utc>>);

    impl TestClock {
        fn at(secs: i64) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(Utc.timestamp_opt(secs, 0).unwrap())))
        }

        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now = *now + Duration::seconds(secs);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    const NOW: i64 = 1_700_000_000;

    fn credential(access: &str, expires_at: i64) -> Credential {
        Credential::expiring(
            ProviderKind::GoogleDrive,
            access,
            Some("refresh".to_string()),
            Utc.timestamp_opt(expires_at, 0).unwrap(),
        )
    }

    fn flow() -> MockFlow {
        let mut flow = MockFlow::new();
        flow.expect_provider()
            .return_const(ProviderKind::GoogleDrive);
        flow
    }

    struct Harness {
        manager: CredentialManager,
        secure_store: Arc<MockSecureStore>,
        token_store: TokenStore,
        event_bus: EventBus,
    }

    fn harness(flow: MockFlow, clock: Arc<TestClock>) -> Harness {
        let secure_store = Arc::new(MockSecureStore::new());
        let token_store = TokenStore::new(secure_store.clone());
        let event_bus = EventBus::new(32);
        let manager =
            CredentialManager::new(Arc::new(flow), token_store.clone(), clock, event_bus.clone());
        Harness {
            manager,
            secure_store,
            token_store,
            event_bus,
        }
    }

    #[tokio::test]
    async fn test_second_acquire_does_not_grant_again() {
        let mut flow = flow();
        flow.expect_grant()
            .times(1)
            .returning(|| Ok(credential("granted", NOW + 3600)));
        flow.expect_refresh().never();
        let h = harness(flow, TestClock::at(NOW));
        let mut events = h.event_bus.subscribe();

        let first = h.manager.acquire().await.unwrap();
        let second = h.manager.acquire().await.unwrap();

        assert_eq!(first.access_token, "granted");
        assert_eq!(second, first);
        assert_eq!(
            h.token_store.load(ProviderKind::GoogleDrive).await.unwrap(),
            Some(first)
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::SignedIn { provider }) if provider == "google_drive"
        ));
    }

    #[tokio::test]
    async fn test_valid_persisted_credential_is_used() {
        let mut flow = flow();
        flow.expect_grant().never();
        flow.expect_refresh().never();
        let h = harness(flow, TestClock::at(NOW));
        h.token_store
            .store(&credential("persisted", NOW + 3600))
            .await
            .unwrap();

        let acquired = h.manager.acquire().await.unwrap();
        assert_eq!(acquired.access_token, "persisted");
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed_and_persisted() {
        let mut flow = flow();
        flow.expect_refresh()
            .withf(|stale| stale.access_token == "stale")
            .times(1)
            .returning(|_| Ok(credential("fresh", NOW + 3600)));
        flow.expect_grant().never();
        let h = harness(flow, TestClock::at(NOW));
        h.token_store
            .store(&credential("stale", NOW - 10))
            .await
            .unwrap();
        let mut events = h.event_bus.subscribe();

        let acquired = h.manager.acquire().await.unwrap();

        assert_eq!(acquired.access_token, "fresh");
        let persisted = h.token_store.load(ProviderKind::GoogleDrive).await.unwrap();
        assert_eq!(persisted.unwrap().access_token, "fresh");
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshing { .. })
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at: Some(at), .. }) if at == NOW + 3600
        ));
    }

    #[tokio::test]
    async fn test_token_inside_buffer_is_refreshed() {
        let mut flow = flow();
        flow.expect_grant()
            .times(1)
            .returning(|| Ok(credential("first", NOW + 600)));
        flow.expect_refresh()
            .times(1)
            .returning(|_| Ok(credential("second", NOW + 4000)));
        let clock = TestClock::at(NOW);
        let h = harness(flow, clock.clone());

        assert_eq!(h.manager.acquire().await.unwrap().access_token, "first");

        // 250s before expiry, inside the 300s buffer
        clock.advance(350);
        assert_eq!(h.manager.acquire().await.unwrap().access_token, "second");
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_grant() {
        let mut flow = flow();
        flow.expect_refresh().times(1).returning(|_| {
            Err(AuthError::RefreshFailed {
                provider: "google_drive".to_string(),
                status: Some(400),
                message: "invalid_grant".to_string(),
            })
        });
        flow.expect_grant()
            .times(1)
            .returning(|| Ok(credential("regranted", NOW + 3600)));
        let h = harness(flow, TestClock::at(NOW));
        h.token_store
            .store(&credential("stale", NOW - 10))
            .await
            .unwrap();

        let acquired = h.manager.acquire().await.unwrap();
        assert_eq!(acquired.access_token, "regranted");
    }

    #[tokio::test]
    async fn test_grant_failure_is_authentication_failed() {
        let mut flow = flow();
        flow.expect_grant()
            .times(1)
            .returning(|| Err(AuthError::NetworkError("connection refused".to_string())));
        let h = harness(flow, TestClock::at(NOW));
        let mut events = h.event_bus.subscribe();

        match h.manager.acquire().await {
            Err(AuthError::AuthenticationFailed { provider, code, .. }) => {
                assert_eq!(provider, "google_drive");
                assert_eq!(code, "network_error");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::AuthError { recoverable: false, .. })
        ));
        assert!(h.manager.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_granted_token_is_rejected() {
        let mut flow = flow();
        flow.expect_grant()
            .returning(|| Ok(credential("", NOW + 3600)));
        let h = harness(flow, TestClock::at(NOW));

        let err = h.manager.acquire().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed { code, .. } if code == "empty_token"));
    }

    #[tokio::test]
    async fn test_corrupt_record_leads_to_grant() {
        let mut flow = flow();
        flow.expect_grant()
            .times(1)
            .returning(|| Ok(credential("granted", NOW + 3600)));
        let h = harness(flow, TestClock::at(NOW));
        h.secure_store
            .set_secret("oauth_tokens:google_drive", b"garbage")
            .await
            .unwrap();

        assert_eq!(h.manager.acquire().await.unwrap().access_token, "granted");
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let mut flow = flow();
        flow.expect_grant()
            .times(2)
            .returning(|| Ok(credential("granted", NOW + 3600)));
        let h = harness(flow, TestClock::at(NOW));

        h.manager.acquire().await.unwrap();
        let mut events = h.event_bus.subscribe();
        h.manager.sign_out().await.unwrap();

        assert!(h.manager.current().await.unwrap().is_none());
        assert!(h
            .secure_store
            .get_secret("oauth_tokens:google_drive")
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::SignedOut { .. })
        ));

        // A new acquisition starts over with a grant.
        h.manager.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn test_current_does_not_touch_network() {
        let mut flow = flow();
        flow.expect_grant().never();
        flow.expect_refresh().never();
        let h = harness(flow, TestClock::at(NOW));
        h.token_store
            .store(&credential("expired", NOW - 1000))
            .await
            .unwrap();

        let current = h.manager.current().await.unwrap().unwrap();
        assert_eq!(current.access_token, "expired");
    }

    fn bearer_manager(token: &str, secure_store: Arc<MockSecureStore>) -> CredentialManager {
        CredentialManager::new(
            Arc::new(crate::flow::BearerTokenFlow::notion(token)),
            TokenStore::new(secure_store),
            TestClock::at(NOW),
            EventBus::new(8),
        )
    }

    #[tokio::test]
    async fn test_rotated_bearer_token_wins_over_storage() {
        let secure_store = Arc::new(MockSecureStore::new());

        let old = bearer_manager("secret_old", secure_store.clone());
        assert_eq!(old.access_token().await.unwrap(), "secret_old");

        let rotated = bearer_manager("secret_new", secure_store.clone());
        assert_eq!(rotated.access_token().await.unwrap(), "secret_new");
        assert!(secure_store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bearer_token_ignores_previously_stored_credential() {
        let secure_store = Arc::new(MockSecureStore::new());
        TokenStore::new(secure_store.clone())
            .store(&Credential::non_expiring(ProviderKind::Notion, "secret_stale"))
            .await
            .unwrap();

        let manager = bearer_manager("secret_configured", secure_store);

        assert!(manager.current().await.unwrap().is_none());
        assert_eq!(manager.access_token().await.unwrap(), "secret_configured");
        assert_eq!(
            manager.current().await.unwrap().unwrap().access_token,
            "secret_configured"
        );
    }
}
