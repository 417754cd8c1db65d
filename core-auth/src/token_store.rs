//! Credential persistence
//!
//! One JSON record per provider, written through the host's
//! [`SecureStore`]. An absent record is the normal "not yet authenticated"
//! state. A record that no longer parses is deleted and reported as absent
//! so the next acquisition starts a fresh grant.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{Credential, ProviderKind, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let token_store = TokenStore::new(secure_store);
//!
//! let credential = Credential::non_expiring(ProviderKind::Notion, "secret_abc");
//! token_store.store(&credential).await?;
//!
//! let loaded = token_store.load(ProviderKind::Notion).await?;
//! assert!(loaded.is_some());
//!
//! token_store.delete(ProviderKind::Notion).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{Credential, ProviderKind};
use bridge_traits::storage::SecureStore;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of every key the token store writes
pub const TOKEN_KEY_PREFIX: &str = "oauth_tokens";

/// Persisted credentials, keyed by provider
///
/// Token values are never logged. Writers from different processes follow
/// last-writer-wins.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Unix epoch seconds; absent for non-expiring tokens
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    scopes: Vec<String>,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        debug!("Initializing TokenStore");
        Self { secure_store }
    }

    /// Secure-store key that holds the credential of `provider`
    pub fn key_for(provider: ProviderKind) -> String {
        format!("{}:{}", TOKEN_KEY_PREFIX, provider.as_str())
    }

    /// Persist `credential`, overwriting any previous record
    pub async fn store(&self, credential: &Credential) -> Result<()> {
        let provider = credential.provider;
        let stored = StoredCredential {
            access_token: credential.access_token.clone(),
            refresh_token: credential.refresh_token.clone(),
            expires_at: credential.expires_at_timestamp(),
            scopes: credential.scopes.clone(),
        };

        let json = serde_json::to_vec(&stored).map_err(|e| {
            warn!(provider = %provider, error = %e, "Failed to serialize credential");
            AuthError::SerializationFailed {
                context: "credential serialization".to_string(),
                source: e,
            }
        })?;

        self.secure_store
            .set_secret(&Self::key_for(provider), &json)
            .await
            .map_err(|e| {
                warn!(provider = %provider, error = %e, "Failed to persist credential");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            provider = %provider,
            has_refresh_token = stored.refresh_token.is_some(),
            expires_at = ?stored.expires_at,
            "Credential stored"
        );
        Ok(())
    }

    /// Load the persisted credential of `provider`
    ///
    /// Returns `Ok(None)` when nothing is stored or the record was corrupt.
    /// Only an unavailable secure store is an error.
    pub async fn load(&self, provider: ProviderKind) -> Result<Option<Credential>> {
        let key = Self::key_for(provider);

        let data = self.secure_store.get_secret(&key).await.map_err(|e| {
            warn!(provider = %provider, error = %e, "Failed to read credential");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            debug!(provider = %provider, "No credential in storage");
            return Ok(None);
        };

        let stored = match Self::decode(provider, &data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Discarding corrupted credential");
                if let Err(delete_err) = self.secure_store.delete_secret(&key).await {
                    warn!(
                        provider = %provider,
                        error = %delete_err,
                        "Failed to delete corrupted credential"
                    );
                }
                return Ok(None);
            }
        };

        let credential = Credential {
            provider,
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at: stored
                .expires_at
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            scopes: stored.scopes,
        };

        debug!(
            provider = %provider,
            has_refresh_token = credential.refresh_token.is_some(),
            "Credential loaded"
        );
        Ok(Some(credential))
    }

    /// Remove the persisted credential; a missing record is not an error
    pub async fn delete(&self, provider: ProviderKind) -> Result<()> {
        self.secure_store
            .delete_secret(&Self::key_for(provider))
            .await
            .map_err(|e| {
                warn!(provider = %provider, error = %e, "Failed to delete credential");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;
        info!(provider = %provider, "Credential deleted");
        Ok(())
    }

    pub async fn has_credential(&self, provider: ProviderKind) -> Result<bool> {
        self.secure_store
            .has_secret(&Self::key_for(provider))
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }

    fn decode(provider: ProviderKind, data: &[u8]) -> Result<StoredCredential> {
        let stored: StoredCredential =
            serde_json::from_slice(data).map_err(|e| AuthError::TokenCorrupted {
                provider: provider.to_string(),
                reason: e.to_string(),
            })?;

        if stored.access_token.is_empty() {
            return Err(AuthError::TokenCorrupted {
                provider: provider.to_string(),
                reason: "empty access token".to_string(),
            });
        }
        if let Some(secs) = stored.expires_at {
            if Utc.timestamp_opt(secs, 0).single().is_none() {
                return Err(AuthError::TokenCorrupted {
                    provider: provider.to_string(),
                    reason: format!("expiry {} out of range", secs),
                });
            }
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use chrono::Duration;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct MockSecureStore {
        storage: Mutex<HashMap<String, Vec<u8>>>,
        fail: bool,
    }

    impl MockSecureStore {
        fn new() -> Self {
            Self {
                storage: Mutex::new(HashMap::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                storage: Mutex::new(HashMap::new()),
                fail: true,
            }
        }

        fn check(&self) -> BridgeResult<()> {
            if self.fail {
                Err(BridgeError::NotAvailable("keychain locked".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.check()?;
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            self.check()?;
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.check()?;
            self.storage.lock().await.remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.storage.lock().await.keys().cloned().collect())
        }
    }

    fn sample_credential() -> Credential {
        Credential::expiring(
            ProviderKind::GoogleDrive,
            "access",
            Some("refresh".to_string()),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
        .with_scopes(vec![
            "https://www.googleapis.com/auth/drive.readonly".to_string()
        ])
    }

    #[test]
    fn test_key_format() {
        assert_eq!(
            TokenStore::key_for(ProviderKind::GoogleDrive),
            "oauth_tokens:google_drive"
        );
        assert_eq!(
            TokenStore::key_for(ProviderKind::Notion),
            "oauth_tokens:notion"
        );
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let store = TokenStore::new(Arc::new(MockSecureStore::new()));
        let credential = sample_credential();

        store.store(&credential).await.unwrap();
        let loaded = store.load(ProviderKind::GoogleDrive).await.unwrap();

        assert_eq!(loaded, Some(credential));
        assert!(store.has_credential(ProviderKind::GoogleDrive).await.unwrap());
        assert!(!store.has_credential(ProviderKind::OneDrive).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_expiring_round_trip() {
        let store = TokenStore::new(Arc::new(MockSecureStore::new()));
        let credential = Credential::non_expiring(ProviderKind::Notion, "secret_abc");

        store.store(&credential).await.unwrap();
        let loaded = store.load(ProviderKind::Notion).await.unwrap().unwrap();

        assert_eq!(loaded.expires_at, None);
        assert!(loaded.is_valid_at(Utc::now() + Duration::days(3650), Duration::zero()));
    }

    #[tokio::test]
    async fn test_missing_is_none() {
        let store = TokenStore::new(Arc::new(MockSecureStore::new()));
        assert!(store.load(ProviderKind::OneDrive).await.unwrap().is_none());
        store.delete(ProviderKind::OneDrive).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupted_record_is_deleted() {
        let secure_store = Arc::new(MockSecureStore::new());
        secure_store
            .set_secret("oauth_tokens:onedrive", b"{not json")
            .await
            .unwrap();
        let store = TokenStore::new(secure_store.clone());

        assert!(store.load(ProviderKind::OneDrive).await.unwrap().is_none());
        assert!(secure_store
            .get_secret("oauth_tokens:onedrive")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_access_token_is_corrupt() {
        let secure_store = Arc::new(MockSecureStore::new());
        secure_store
            .set_secret("oauth_tokens:google_drive", br#"{"access_token":""}"#)
            .await
            .unwrap();
        let store = TokenStore::new(secure_store);

        assert!(store.load(ProviderKind::GoogleDrive).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_is_error() {
        let store = TokenStore::new(Arc::new(MockSecureStore::failing()));

        let err = store.load(ProviderKind::GoogleDrive).await.unwrap_err();
        assert!(matches!(err, AuthError::SecureStorageUnavailable(_)));

        let err = store.store(&sample_credential()).await.unwrap_err();
        assert!(matches!(err, AuthError::SecureStorageUnavailable(_)));
    }
}
