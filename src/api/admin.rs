use super::AppError;
use crate::auth::authorize_admin;
use crate::credentials::TenantRecord;
use crate::identity::TenantIdentity;
use crate::tenant::TenantCredentials;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::{delete, get},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

/// State for the tenant admin API.
#[derive(Clone)]
pub struct AdminAppState {
    pub tenants: Arc<TenantCredentials>,
    /// Required bearer token. None = endpoints open (dev mode).
    pub admin_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TenantsResponse {
    tenants: Vec<TenantRecord>,
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    disconnected: bool,
    email: String,
}

pub fn create_admin_router(state: AdminAppState) -> Router {
    Router::new()
        .route("/api/tenants", get(list_tenants))
        .route("/api/tenants/:email", delete(disconnect_tenant))
        .with_state(Arc::new(state))
}

/// GET /api/tenants. Connected tenants, credentials never included.
async fn list_tenants(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
) -> Result<Json<TenantsResponse>, AppError> {
    check_admin(&state, &headers)?;

    let tenants = state.tenants.list_tenants().await.map_err(|e| {
        error!(error = %e, "Failed to list tenants");
        AppError::ServerError("Failed to list tenants".to_string())
    })?;

    Ok(Json(TenantsResponse {
        count: tenants.len(),
        tenants,
    }))
}

/// DELETE /api/tenants/:email
async fn disconnect_tenant(
    State(state): State<Arc<AdminAppState>>,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DisconnectResponse>, AppError> {
    check_admin(&state, &headers)?;

    let identity = TenantIdentity::parse(&email)
        .map_err(|e| AppError::BadRequest(format!("Invalid tenant email: {}", e)))?;

    let removed = state.tenants.disconnect(&identity).await.map_err(|e| {
        error!(tenant = %identity.redacted(), error = %e, "Failed to disconnect tenant");
        AppError::ServerError("Failed to disconnect tenant".to_string())
    })?;

    if !removed {
        return Err(AppError::NotFound(format!(
            "Tenant '{}' is not connected",
            identity
        )));
    }

    Ok(Json(DisconnectResponse {
        disconnected: true,
        email: identity.as_str().to_string(),
    }))
}

fn check_admin(state: &AdminAppState, headers: &HeaderMap) -> Result<(), AppError> {
    authorize_admin(headers, state.admin_token.as_deref()).map_err(|e| {
        warn!(error = %e, "Rejected admin request");
        AppError::Unauthorized("Unauthorized".to_string())
    })
}
