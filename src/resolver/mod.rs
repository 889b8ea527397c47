//! Picks the calendar client for a request.
//!
//! A named tenant gets that tenant's client or nothing. Only a request that
//! names no tenant is served by the default credential; a failed tenant
//! lookup is never answered with the default calendar.

use crate::calendar::CalendarApi;
use crate::default_client::DefaultCredentialHolder;
use crate::tenant::TenantCredentials;
use std::sync::Arc;

#[derive(Clone)]
pub struct ClientResolver {
    tenants: Arc<TenantCredentials>,
    default: Arc<DefaultCredentialHolder>,
}

impl ClientResolver {
    pub fn new(tenants: Arc<TenantCredentials>, default: Arc<DefaultCredentialHolder>) -> Self {
        Self { tenants, default }
    }

    /// `None` and `""` select the default credential. Anything else, even
    /// whitespace, is a tenant identity.
    pub async fn resolve(&self, identity: Option<&str>) -> Option<Arc<dyn CalendarApi>> {
        match identity {
            Some(identity) if !identity.is_empty() => {
                self.tenants.get_client_for_tenant(identity).await
            }
            _ => self.default.get_client().await,
        }
    }

    pub fn tenants(&self) -> &Arc<TenantCredentials> {
        &self.tenants
    }

    pub fn default_holder(&self) -> &Arc<DefaultCredentialHolder> {
        &self.default
    }
}
