//! OAuth 2.0 authorization code flow with PKCE, plus the refresh-token grant.

use crate::error::{AuthError, Result};
use crate::types::{Credential, ProviderKind};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::Duration as ChronoDuration;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const MICROSOFT_AUTHORITY_BASE: &str = "https://login.microsoftonline.com";
const ONEDRIVE_SCOPES: [&str; 3] = ["Files.Read", "Files.Read.All", "offline_access"];

/// Loopback redirect used by desktop hosts
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8400/";

const MAX_REFRESH_ATTEMPTS: u32 = 3;
/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// OAuth 2.0 provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub provider: ProviderKind,
    pub client_id: String,
    /// Absent for public clients
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    /// Provider-specific authorization URL parameters
    pub extra_auth_params: Vec<(String, String)>,
    /// Re-send `scope` with refresh requests (Microsoft identity platform)
    pub scopes_on_refresh: bool,
}

impl OAuthConfig {
    /// Google Drive, read-only scope, offline access so a refresh token is issued
    pub fn google_drive(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            provider: ProviderKind::GoogleDrive,
            client_id: client_id.into(),
            client_secret,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: vec![GOOGLE_DRIVE_READONLY_SCOPE.to_string()],
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            extra_auth_params: vec![
                ("access_type".to_string(), "offline".to_string()),
                ("prompt".to_string(), "consent".to_string()),
            ],
            scopes_on_refresh: false,
        }
    }

    /// OneDrive through the Microsoft identity platform of `tenant`
    pub fn onedrive(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        tenant: &str,
    ) -> Self {
        let authority = format!("{}/{}", MICROSOFT_AUTHORITY_BASE, tenant.trim_matches('/'));
        Self {
            provider: ProviderKind::OneDrive,
            client_id: client_id.into(),
            client_secret,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: ONEDRIVE_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: format!("{}/oauth2/v2.0/authorize", authority),
            token_url: format!("{}/oauth2/v2.0/token", authority),
            extra_auth_params: Vec::new(),
            scopes_on_refresh: true,
        }
    }

    /// Parse a Google `credentials.json` client-secrets file.
    ///
    /// Both the `installed` and the `web` application sections are accepted.
    /// The first registered redirect URI is used when present.
    pub fn from_google_client_secrets(json: &[u8]) -> Result<Self> {
        let file: GoogleClientSecrets = serde_json::from_slice(json).map_err(|e| {
            AuthError::InvalidConfig(format!("unreadable client secrets file: {}", e))
        })?;
        let section = file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidConfig(
                "client secrets file has neither an 'installed' nor a 'web' section".to_string(),
            )
        })?;

        if section.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig(
                "client secrets file has an empty client_id".to_string(),
            ));
        }

        let mut config = Self::google_drive(section.client_id, section.client_secret);
        if let Some(auth_uri) = section.auth_uri {
            config.auth_url = auth_uri;
        }
        if let Some(token_uri) = section.token_uri {
            config.token_url = token_uri;
        }
        if let Some(redirect) = section.redirect_uris.into_iter().next() {
            config.redirect_uri = redirect;
        }
        Ok(config)
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct GoogleClientSecrets {
    installed: Option<GoogleClientSection>,
    web: Option<GoogleClientSection>,
}

#[derive(Debug, Deserialize)]
struct GoogleClientSection {
    client_id: String,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// The verifier stays local; only its S256 challenge is sent with the
/// authorization request.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    verifier: String,
    /// CSRF state echoed back by the redirect
    state: String,
}

impl PkceVerifier {
    /// 32 random bytes of verifier and 16 of state, base64url without padding
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Token endpoint client for one provider.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            http_client,
            clock,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Authorization URL to show the user, with the verifier to keep for
    /// [`exchange_code`](Self::exchange_code).
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", verifier.state());
            query.append_pair("code_challenge", &challenge);
            query.append_pair("code_challenge_method", "S256");
            for (key, value) in &self.config.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        debug!("Built authorization URL");
        Ok((url.to_string(), verifier))
    }

    /// Exchange the code delivered to the redirect for a credential.
    ///
    /// Any failure here is an [`AuthError::AuthenticationFailed`] (or a state
    /// mismatch, which the caller folds into one).
    #[instrument(skip(self, code, verifier), fields(provider = %self.config.provider))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<Credential> {
        if state != verifier.state() {
            warn!("OAuth state mismatch");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", verifier.verifier()),
        ];
        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        debug!("Exchanging authorization code");
        let response = self
            .http_client
            .execute(self.token_request(&params)?)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let (code, description) = token_error(&response);
            warn!(
                status = response.status,
                error = %code,
                "Token endpoint rejected authorization code"
            );
            return Err(AuthError::AuthenticationFailed {
                provider: self.config.provider.to_string(),
                code,
                description,
            });
        }

        let token = parse_token_response(&response)?;
        if token.access_token.is_empty() {
            return Err(AuthError::AuthenticationFailed {
                provider: self.config.provider.to_string(),
                code: "empty_token".to_string(),
                description: "token endpoint returned an empty access token".to_string(),
            });
        }

        info!(expires_in = ?token.expires_in, "Exchanged code for tokens");
        Ok(self.credential_from(token, None))
    }

    /// Obtain a new access token with `refresh_token`.
    ///
    /// 5xx answers are retried with exponential backoff up to three
    /// attempts in total; 4xx answers fail immediately. The old refresh token
    /// is kept when the provider does not rotate it.
    #[instrument(skip(self, refresh_token), fields(provider = %self.config.provider))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<Credential> {
        let scope = self.config.scopes.join(" ");
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }
        if self.config.scopes_on_refresh && !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }

        let mut attempts = 0;
        loop {
            attempts += 1;

            let response = self
                .http_client
                .execute(self.token_request(&params)?)
                .await
                .map_err(|e| self.refresh_failed(None, e.to_string()))?;

            if response.is_success() {
                let token = parse_token_response(&response)?;
                info!(expires_in = ?token.expires_in, "Refreshed access token");
                return Ok(self.credential_from(token, Some(refresh_token)));
            }

            let status = response.status;
            let (code, description) = token_error(&response);

            if !response.is_server_error() {
                warn!(status, error = %code, "Token refresh rejected");
                return Err(self.refresh_failed(Some(status), format!("{}: {}", code, description)));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(self.refresh_failed(
                    Some(status),
                    format!(
                        "failed after {} attempts, last error {}: {}",
                        attempts, code, description
                    ),
                ));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }

    fn token_request(&self, params: &[(&str, &str)]) -> Result<HttpRequest> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::InvalidConfig(format!("Failed to encode token request: {}", e)))?;
        Ok(
            HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .header("Accept", "application/json")
                .body(Bytes::from(encoded)),
        )
    }

    fn credential_from(&self, token: TokenResponse, previous_refresh: Option<&str>) -> Credential {
        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let refresh_token = token
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string));
        let scopes = token
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_else(|| self.config.scopes.clone());

        Credential::expiring(
            self.config.provider,
            token.access_token,
            refresh_token,
            self.clock.now() + ChronoDuration::seconds(expires_in),
        )
        .with_scopes(scopes)
    }

    fn refresh_failed(&self, status: Option<u16>, message: String) -> AuthError {
        AuthError::RefreshFailed {
            provider: self.config.provider.to_string(),
            status,
            message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse> {
    serde_json::from_slice(&response.body).map_err(|e| AuthError::SerializationFailed {
        context: "token response".to_string(),
        source: e,
    })
}

/// `(code, description)` of a failed token request
fn token_error(response: &HttpResponse) -> (String, String) {
    match serde_json::from_slice::<TokenErrorBody>(&response.body) {
        Ok(body) => (
            body.error,
            body.error_description.unwrap_or_default(),
        ),
        Err(_) => (format!("http_{}", response.status), response.text_lossy()),
    }
}
