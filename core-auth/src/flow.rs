//! Provider authentication flows
//!
//! Every provider obtains credentials through one [`AuthFlow`]. The
//! [`CredentialManager`](crate::CredentialManager) owns caching, persistence
//! and the refresh-then-grant fallback; a flow only knows how to talk to its
//! provider.
//!
//! - [`OAuthFlow`]: authorization code with PKCE, then refresh-token grants.
//!   The browser round trip is delegated to an [`AuthorizationCallback`].
//! - [`BearerTokenFlow`]: a pre-issued token handed over as-is (Notion
//!   integration tokens).

use crate::error::{AuthError, Result};
use crate::oauth::OAuthFlowManager;
use crate::types::{Credential, ProviderKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// How a provider issues and renews credentials.
#[async_trait]
pub trait AuthFlow: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Silent renewal of `credential`, without user interaction.
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;

    /// Full grant. May involve the user.
    async fn grant(&self) -> Result<Credential>;

    /// Whether credentials from this flow are written to the token store.
    ///
    /// A flow that derives its credential from configuration returns
    /// `false`, so a stored copy can never shadow the configured value.
    fn persists(&self) -> bool {
        true
    }
}

/// Code and state delivered to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: String,
}

impl AuthorizationResponse {
    pub fn new(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: state.into(),
        }
    }
}

/// Host-provided part of the interactive login.
///
/// Implementations open `authorization_url` in a browser, wait for the
/// provider to redirect back and return what the redirect carried. A user
/// who denies access should be reported as
/// [`AuthError::AuthenticationFailed`] with the provider's error code.
#[async_trait]
pub trait AuthorizationCallback: Send + Sync {
    async fn authorize(
        &self,
        provider: ProviderKind,
        authorization_url: &str,
    ) -> Result<AuthorizationResponse>;
}

/// OAuth 2.0 flow for Google Drive and OneDrive.
pub struct OAuthFlow {
    manager: OAuthFlowManager,
    callback: Arc<dyn AuthorizationCallback>,
}

impl OAuthFlow {
    pub fn new(manager: OAuthFlowManager, callback: Arc<dyn AuthorizationCallback>) -> Self {
        Self { manager, callback }
    }
}

#[async_trait]
impl AuthFlow for OAuthFlow {
    fn provider(&self) -> ProviderKind {
        self.manager.config().provider
    }

    #[instrument(skip(self, credential), fields(provider = %self.provider()))]
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::NoRefreshToken {
                provider: self.provider().to_string(),
            })?;
        self.manager.refresh_access_token(refresh_token).await
    }

    #[instrument(skip(self), fields(provider = %self.provider()))]
    async fn grant(&self) -> Result<Credential> {
        let (url, verifier) = self.manager.build_auth_url()?;
        debug!("Waiting for authorization callback");

        let response = self.callback.authorize(self.provider(), &url).await?;
        self.manager
            .exchange_code(&response.code, &response.state, &verifier)
            .await
    }
}

/// Static bearer token issued out of band.
///
/// `grant` returns the configured token as a non-expiring credential and
/// `refresh` returns the same token again. Nothing is persisted: the
/// configured token is the only source.
pub struct BearerTokenFlow {
    provider: ProviderKind,
    token: String,
}

impl BearerTokenFlow {
    pub fn new(provider: ProviderKind, token: impl Into<String>) -> Self {
        Self {
            provider,
            token: token.into(),
        }
    }

    pub fn notion(token: impl Into<String>) -> Self {
        Self::new(ProviderKind::Notion, token)
    }
}

#[async_trait]
impl AuthFlow for BearerTokenFlow {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn refresh(&self, _credential: &Credential) -> Result<Credential> {
        self.grant().await
    }

    async fn grant(&self) -> Result<Credential> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(AuthError::AuthenticationFailed {
                provider: self.provider.to_string(),
                code: "missing_token".to_string(),
                description: "no integration token configured".to_string(),
            });
        }
        Ok(Credential::non_expiring(self.provider, token))
    }

    fn persists(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for BearerTokenFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenFlow")
            .field("provider", &self.provider)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::OAuthConfig;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{DownloadStream, HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::time::SystemClock;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn download_stream(&self, request: HttpRequest) -> BridgeResult<DownloadStream>;
        }
    }

    /// Answers with the state parsed from the authorization URL.
    struct EchoCallback {
        code: &'static str,
        tamper_state: bool,
    }

    #[async_trait]
    impl AuthorizationCallback for EchoCallback {
        async fn authorize(
            &self,
            _provider: ProviderKind,
            authorization_url: &str,
        ) -> Result<AuthorizationResponse> {
            let url = url::Url::parse(authorization_url).unwrap();
            let state = url
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            let state = if self.tamper_state {
                format!("{state}x")
            } else {
                state
            };
            Ok(AuthorizationResponse::new(self.code, state))
        }
    }

    fn token_ok() -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from_static(
                br#"{"access_token":"granted","refresh_token":"r1","expires_in":3600}"#,
            ),
        }
    }

    fn oauth_flow(http: MockHttpClient, tamper_state: bool) -> OAuthFlow {
        let manager = OAuthFlowManager::new(
            OAuthConfig::google_drive("client", None),
            Arc::new(http),
            Arc::new(SystemClock),
        );
        OAuthFlow::new(
            manager,
            Arc::new(EchoCallback {
                code: "auth-code",
                tamper_state,
            }),
        )
    }

    #[tokio::test]
    async fn test_oauth_grant_exchanges_callback_code() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                let body = String::from_utf8(request.body.clone().unwrap().to_vec()).unwrap();
                body.contains("code=auth-code")
            })
            .times(1)
            .returning(|_| Ok(token_ok()));
        let flow = oauth_flow(http, false);

        let credential = flow.grant().await.unwrap();
        assert_eq!(credential.access_token, "granted");
        assert_eq!(credential.provider, ProviderKind::GoogleDrive);
    }

    #[tokio::test]
    async fn test_oauth_grant_rejects_tampered_state() {
        let flow = oauth_flow(MockHttpClient::new(), true);
        let err = flow.grant().await.unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch { .. }));
    }

    #[tokio::test]
    async fn test_oauth_refresh_requires_refresh_token() {
        let flow = oauth_flow(MockHttpClient::new(), false);
        let credential = Credential::non_expiring(ProviderKind::GoogleDrive, "stale");

        let err = flow.refresh(&credential).await.unwrap_err();
        assert!(matches!(err, AuthError::NoRefreshToken { .. }));
    }

    #[tokio::test]
    async fn test_bearer_flow_grant_and_refresh() {
        let flow = BearerTokenFlow::notion("secret_abc");

        let granted = flow.grant().await.unwrap();
        assert_eq!(granted.access_token, "secret_abc");
        assert_eq!(granted.expires_at, None);

        let refreshed = flow.refresh(&granted).await.unwrap();
        assert_eq!(refreshed, granted);
        assert!(!format!("{:?}", flow).contains("secret_abc"));
        assert!(!flow.persists());
        assert!(oauth_flow(MockHttpClient::new(), false).persists());
    }

    #[tokio::test]
    async fn test_bearer_flow_without_token() {
        let flow = BearerTokenFlow::notion("   ");
        let err = flow.grant().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed { code, .. } if code == "missing_token"));
    }
}
