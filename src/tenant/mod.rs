//! Per-tenant calendar clients backed by the credential store.
//!
//! Holds no credential state between calls: every lookup reads the store,
//! refreshes when needed, and writes the refreshed credential back. The
//! store is the source of truth, so concurrent refreshes for one tenant are
//! harmless (last write wins).
//!
//! This type has no access to the default credential holder, so completing
//! an OAuth exchange can only ever write to the store.

use crate::calendar::{CalendarApi, CalendarBackend};
use crate::credentials::{CredentialStore, Credentials, TenantRecord};
use crate::identity::{redact_email, TenantIdentity};
use crate::oauth::OAuthClient;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};


pub struct TenantCredentials {
    store: Arc<dyn CredentialStore>,
    oauth: Arc<dyn OAuthClient>,
    calendar: Arc<dyn CalendarBackend>,
}

impl TenantCredentials {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        oauth: Arc<dyn OAuthClient>,
        calendar: Arc<dyn CalendarBackend>,
    ) -> Self {
        Self {
            store,
            oauth,
            calendar,
        }
    }

    /// Calendar client for a tenant, or `None` when the tenant has no usable
    /// credential. Failures are logged, never returned.
    pub async fn get_client_for_tenant(&self, raw_identity: &str) -> Option<Arc<dyn CalendarApi>> {
        let identity = match TenantIdentity::parse(raw_identity) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(tenant = %redact_email(raw_identity), error = %e, "Rejected tenant identity");
                return None;
            }
        };
        let tenant = identity.redacted();

        let key = identity.as_str().to_string();
        let blob = match self.with_store(move |store| store.get(&key)).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                info!(tenant = %tenant, "No stored credentials for tenant");
                return None;
            }
            Err(e) => {
                error!(tenant = %tenant, error = %e, "Failed to read tenant credentials");
                return None;
            }
        };

        let mut credentials = match Credentials::from_json(&blob) {
            Ok(credentials) => credentials,
            Err(e) => {
                error!(tenant = %tenant, error = %e, "Stored tenant credentials are unreadable");
                return None;
            }
        };

        if credentials.is_expired() && credentials.can_refresh() {
            credentials = match self.oauth.refresh(&credentials).await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "Tenant token refresh failed");
                    return None;
                }
            };
            debug!(tenant = %tenant, "Refreshed tenant access token");

            // The refreshed token is usable for this request even if the write fails.
            if let Err(e) = self.persist_refreshed(&identity, &credentials).await {
                warn!(tenant = %tenant, error = %e, "Failed to persist refreshed credentials");
            }
        }

        if !credentials.is_valid() {
            info!(tenant = %tenant, "Tenant credentials are expired and cannot be refreshed");
            return None;
        }

        Some(self.calendar.client_for(&credentials))
    }

    /// Exchange an authorization code and store the credential under the
    /// authenticated email. Returns the identity on success.
    pub async fn complete_oauth_exchange(&self, code: &str) -> Option<TenantIdentity> {
        let credentials = match self.oauth.exchange_code(code).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "OAuth code exchange failed");
                return None;
            }
        };

        let profile = match self.oauth.fetch_identity(&credentials.access_token).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Failed to fetch identity for exchanged token");
                return None;
            }
        };

        let Some(email) = profile.email.as_deref() else {
            warn!("Identity response carried no email");
            return None;
        };
        let identity = match TenantIdentity::parse(email) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(tenant = %redact_email(email), error = %e, "Provider returned an unusable email");
                return None;
            }
        };

        let blob = match credentials.to_json() {
            Ok(blob) => blob,
            Err(e) => {
                error!(error = %e, "Failed to serialize exchanged credentials");
                return None;
            }
        };
        let key = identity.as_str().to_string();
        let display_name = profile.name.clone();
        let stored = self
            .with_store(move |store| store.put(&key, &blob, display_name.as_deref()))
            .await;

        match stored {
            Ok(()) => {
                info!(tenant = %identity.redacted(), "Connected tenant calendar");
                Some(identity)
            }
            Err(e) => {
                error!(tenant = %identity.redacted(), error = %e, "Failed to store tenant credentials");
                None
            }
        }
    }

    pub async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        self.with_store(|store| store.list()).await
    }

    /// Forget a tenant's credential. Returns false when none was stored.
    pub async fn disconnect(&self, identity: &TenantIdentity) -> Result<bool> {
        let key = identity.as_str().to_string();
        let removed = self.with_store(move |store| store.delete(&key)).await?;
        if removed {
            info!(tenant = %identity.redacted(), "Disconnected tenant calendar");
        }
        Ok(removed)
    }

    async fn persist_refreshed(&self, identity: &TenantIdentity, credentials: &Credentials) -> Result<()> {
        let key = identity.as_str().to_string();
        let blob = credentials.to_json()?;
        self.with_store(move |store| store.update(&key, &blob)).await
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&dyn CredentialStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || operation(&*store))
            .await
            .context("Credential store task failed")?
    }
}
