//! OAuth credentials and the per-tenant credential store.
//!
//! A [`Credentials`] value authorizes calendar operations for exactly one
//! identity. Its serialized JSON form is the unit persisted to a
//! [`CredentialStore`], keyed by tenant email.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore (trait)            │
//! │  - get / put / update / list / delete    │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!    (encrypt)            (decrypt)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       SqliteCredentialStore              │
//! │  - AES-256-GCM blob at rest              │
//! │  - one row per tenant email              │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use aria::credentials::{CredentialStore, Credentials, SqliteCredentialStore};
//! use chrono::{Duration, Utc};
//!
//! # fn main() -> anyhow::Result<()> {
//! let encryption_key = std::env::var("ARIA_ENCRYPTION_KEY")?;
//! let store = SqliteCredentialStore::new("credentials.db", &encryption_key)?;
//!
//! let creds = Credentials {
//!     access_token: "ya29.access".to_string(),
//!     refresh_token: Some("1//refresh".to_string()),
//!     expires_at: Some(Utc::now() + Duration::hours(1)),
//!     scope: None,
//!     token_type: Some("Bearer".to_string()),
//! };
//! store.put("alice@example.com", &creds.to_json()?, Some("Alice"))?;
//!
//! if let Some(blob) = store.get("alice@example.com")? {
//!     let creds = Credentials::from_json(&blob)?;
//!     println!("valid: {}", creds.is_valid());
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

mod encryption;
mod storage;

pub use storage::SqliteCredentialStore;

pub use encryption::{validate_key, BlobCipher};

/// Seconds before the real expiry at which a token is already treated as expired,
/// so a request never starts with a token that lapses mid-call.
const EXPIRY_SKEW_SECONDS: i64 = 30;

/// OAuth token material for one identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth access token (used for API requests)
    pub access_token: String,

    /// OAuth refresh token (used to obtain new access tokens)
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token expires (UTC). `None` means no known expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Space-separated scopes granted to the token
    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub token_type: Option<String>,
}

impl Credentials {
    /// True when the access token is at (or within the skew of) its expiry.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expiry) => Utc::now() + Duration::seconds(EXPIRY_SKEW_SECONDS) >= expiry,
            None => false,
        }
    }

    /// True when a refresh token is available.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// True when the credential can authorize a request right now.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Apply a refresh response. Providers usually omit the refresh token on
    /// refresh, in which case the existing one is kept.
    pub fn merge_refreshed(&mut self, refreshed: Credentials) {
        self.access_token = refreshed.access_token;
        self.expires_at = refreshed.expires_at;
        if refreshed.refresh_token.is_some() {
            self.refresh_token = refreshed.refresh_token;
        }
        if refreshed.scope.is_some() {
            self.scope = refreshed.scope;
        }
        if refreshed.token_type.is_some() {
            self.token_type = refreshed.token_type;
        }
    }

    /// Serialized form persisted to the credential store.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize credentials")
    }

    /// Parse a serialized credential blob.
    ///
    /// Accepts both this crate's field names and the `token` / `expiry` names
    /// used by Google's authorized-user JSON, so an existing token file can be
    /// pasted into the environment as-is.
    pub fn from_json(blob: &str) -> Result<Self> {
        let raw: RawCredentials =
            serde_json::from_str(blob).context("Failed to parse credential JSON")?;
        let access_token = raw
            .access_token
            .or(raw.token)
            .context("Credential JSON has no access token")?;
        let expires_at = match raw.expires_at.or(raw.expiry) {
            Some(value) => Some(parse_expiry(&value)?),
            None => None,
        };
        let scope = raw.scope.or_else(|| raw.scopes.map(|scopes| scopes.join(" ")));

        Ok(Self {
            access_token,
            refresh_token: raw.refresh_token,
            expires_at,
            scope,
            token_type: raw.token_type,
        })
    }
}

#[derive(Deserialize)]
struct RawCredentials {
    access_token: Option<String>,
    token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<String>,
    expiry: Option<String>,
    scope: Option<String>,
    scopes: Option<Vec<String>>,
    token_type: Option<String>,
}

fn parse_expiry(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    // Google's authorized-user files write naive UTC timestamps.
    let naive = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .with_context(|| format!("Invalid credential expiry '{}'", value))?;
    Ok(naive.and_utc())
}

/// Summary row for one connected tenant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TenantRecord {
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistent store of one serialized credential blob per tenant email.
///
/// Implementations block; async callers run them on the blocking pool.
pub trait CredentialStore: Send + Sync {
    /// Serialized credential for `email`, if one is stored.
    fn get(&self, email: &str) -> Result<Option<String>>;

    /// Insert or replace the credential for `email`.
    fn put(&self, email: &str, credentials: &str, display_name: Option<&str>) -> Result<()>;

    /// Replace the credential blob for an existing tenant, keeping its display name.
    fn update(&self, email: &str, credentials: &str) -> Result<()>;

    /// All connected tenants, ordered by email.
    fn list(&self) -> Result<Vec<TenantRecord>>;

    /// Remove a tenant. Returns false when nothing was stored.
    fn delete(&self, email: &str) -> Result<bool>;
}
