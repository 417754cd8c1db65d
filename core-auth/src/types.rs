use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote services a credential can belong to.
///
/// # Examples
///
/// ```
/// use core_auth::ProviderKind;
///
/// let provider = ProviderKind::GoogleDrive;
/// assert_eq!(provider.display_name(), "Google Drive");
/// assert_eq!(provider.to_string(), "google_drive");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Drive cloud storage
    GoogleDrive,
    /// Microsoft OneDrive through Graph
    #[serde(rename = "onedrive")]
    OneDrive,
    /// Notion databases
    Notion,
}

impl ProviderKind {
    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::GoogleDrive => "Google Drive",
            ProviderKind::OneDrive => "OneDrive",
            ProviderKind::Notion => "Notion",
        }
    }

    /// Stable key used in storage keys, events and log fields.
    ///
    /// ```
    /// use core_auth::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::OneDrive.as_str(), "onedrive");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GoogleDrive => "google_drive",
            ProviderKind::OneDrive => "onedrive",
            ProviderKind::Notion => "notion",
        }
    }

    /// Parse a provider kind from a string identifier
    ///
    /// ```
    /// use core_auth::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::parse("google_drive"), Some(ProviderKind::GoogleDrive));
    /// assert_eq!(ProviderKind::parse("invalid"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google_drive" | "googledrive" | "gdrive" => Some(ProviderKind::GoogleDrive),
            "onedrive" | "one_drive" => Some(ProviderKind::OneDrive),
            "notion" => Some(ProviderKind::Notion),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access credential for one provider.
///
/// A credential is never mutated after creation: refreshing produces a new
/// value. `expires_at == None` marks a token that does not expire, such as
/// a Notion integration token.
///
/// # Security
///
/// The `Debug` implementation redacts both tokens.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use core_auth::{Credential, ProviderKind};
///
/// let now = Utc::now();
/// let credential = Credential::expiring(
///     ProviderKind::GoogleDrive,
///     "ya29.a0...",
///     Some("1//0g...".to_string()),
///     now + Duration::hours(1),
/// );
///
/// assert!(credential.is_valid_at(now, Duration::minutes(5)));
/// assert!(!credential.is_valid_at(now + Duration::minutes(56), Duration::minutes(5)));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub provider: ProviderKind,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl Credential {
    /// Token that never expires and cannot be refreshed
    pub fn non_expiring(provider: ProviderKind, access_token: impl Into<String>) -> Self {
        Self {
            provider,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scopes: Vec::new(),
        }
    }

    pub fn expiring(
        provider: ProviderKind,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provider,
            access_token: access_token.into(),
            refresh_token,
            expires_at: Some(expires_at),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// True when the token can be used at `now` without refreshing.
    ///
    /// A token inside the `buffer` window before its expiry is treated as
    /// already expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at {
            None => true,
            Some(expires_at) => now + buffer < expires_at,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// Expiry as Unix epoch seconds
    pub fn expires_at_timestamp(&self) -> Option<i64> {
        self.expires_at.map(|at| at.timestamp())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}
