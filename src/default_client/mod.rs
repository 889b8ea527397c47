//! The single-calendar ("legacy") credential used when a request names no tenant.
//!
//! Built once at startup and shared by reference. The slot is guarded by an
//! async mutex and refreshed in place while the lock is held, so readers
//! never observe a half-refreshed credential.

use crate::calendar::{CalendarApi, CalendarBackend};
use crate::credentials::Credentials;
use crate::oauth::OAuthClient;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub struct DefaultCredentialHolder {
    slot: Mutex<Option<Credentials>>,
    oauth: Arc<dyn OAuthClient>,
    calendar: Arc<dyn CalendarBackend>,
}

impl DefaultCredentialHolder {
    pub fn new(
        credentials: Option<Credentials>,
        oauth: Arc<dyn OAuthClient>,
        calendar: Arc<dyn CalendarBackend>,
    ) -> Self {
        Self {
            slot: Mutex::new(credentials),
            oauth,
            calendar,
        }
    }

    /// Build from the serialized credential in the environment. A missing or
    /// blank value leaves the slot empty; an unparseable one is logged.
    pub fn from_env_json(
        raw: Option<&str>,
        oauth: Arc<dyn OAuthClient>,
        calendar: Arc<dyn CalendarBackend>,
    ) -> Self {
        let credentials = match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => {
                info!("No default calendar credential configured");
                None
            }
            Some(raw) => match Credentials::from_json(raw) {
                Ok(credentials) => {
                    info!("Loaded default calendar credential");
                    Some(credentials)
                }
                Err(e) => {
                    error!(error = %e, "Ignoring unparseable default calendar credential");
                    None
                }
            },
        };
        Self::new(credentials, oauth, calendar)
    }

    /// Whether the slot holds a usable credential, refreshing it first when
    /// it has expired and can be refreshed.
    pub async fn is_valid(&self) -> bool {
        let mut slot = self.slot.lock().await;
        self.ensure_fresh(&mut slot).await
    }

    /// Client bound to the current credential, if it is usable.
    pub async fn get_client(&self) -> Option<Arc<dyn CalendarApi>> {
        let mut slot = self.slot.lock().await;
        if !self.ensure_fresh(&mut slot).await {
            return None;
        }
        slot.as_ref()
            .map(|credentials| self.calendar.client_for(credentials))
    }

    /// Copy of the held credential.
    pub async fn snapshot(&self) -> Option<Credentials> {
        self.slot.lock().await.clone()
    }

    async fn ensure_fresh(&self, slot: &mut Option<Credentials>) -> bool {
        let Some(credentials) = slot.as_mut() else {
            return false;
        };

        if credentials.is_expired() && credentials.can_refresh() {
            match self.oauth.refresh(credentials).await {
                Ok(refreshed) => {
                    *credentials = refreshed;
                    info!("Refreshed default calendar credential");
                }
                Err(e) => {
                    warn!(error = %e, "Default calendar credential refresh failed");
                    return false;
                }
            }
        }

        credentials.is_valid()
    }
}
