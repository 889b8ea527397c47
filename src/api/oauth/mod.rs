//! OAuth endpoints connecting a tenant's calendar.
//!
//! 1. GET /auth/login → issue CSRF state, set `oauth_state` cookie, redirect to provider
//! 2. User authorizes on provider's site
//! 3. Provider redirects to GET /auth/callback?code&state
//! 4. State must match the cookie and be outstanding; it is consumed either way
//! 5. Code is exchanged and the credential stored under the authenticated email
//!
//! The callback only ever writes to the credential store. The default
//! calendar is never touched by a tenant connecting.

use super::AppError;
use crate::oauth::{OAuthProviderConfig, StateManager};
use crate::tenant::TenantCredentials;
use axum::{
    extract::{Query, State},
    response::{Json, Redirect},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};


/// Cookie binding the browser to the state it was issued
pub const STATE_COOKIE: &str = "oauth_state";

const COOKIE_PATH: &str = "/auth";

/// Shared application state for OAuth API
#[derive(Clone)]
pub struct OAuthAppState {
    pub tenants: Arc<TenantCredentials>,
    pub state_manager: StateManager,
    pub provider: OAuthProviderConfig,
    /// Mark the state cookie `Secure` (public URL is https)
    pub secure_cookies: bool,
}

/// OAuth callback query parameters
#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// OAuth success response
#[derive(Debug, Serialize)]
pub struct OAuthSuccessResponse {
    success: bool,
    email: String,
}

/// Create OAuth API router
pub fn create_oauth_router(state: OAuthAppState) -> Router {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .with_state(Arc::new(state))
}

/// GET /auth/login
///
/// Redirects to the provider's consent page with a fresh CSRF state, which
/// is also set as a short-lived cookie scoped to `/auth`.
async fn login(
    State(state): State<Arc<OAuthAppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    if !state.provider.is_configured() {
        warn!("OAuth login requested but provider credentials are not configured");
        return Err(AppError::ServerError(
            "OAuth not configured. Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET.".to_string(),
        ));
    }

    let csrf_state = state.state_manager.issue();
    let max_age = time::Duration::seconds(state.state_manager.ttl().as_secs() as i64);
    let cookie = Cookie::build((STATE_COOKIE, csrf_state.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path(COOKIE_PATH)
        .max_age(max_age)
        .secure(state.secure_cookies);

    let auth_url = state.provider.build_auth_url(&csrf_state);
    info!("Redirecting to OAuth provider");

    Ok((jar.add(cookie), Redirect::temporary(&auth_url)))
}

/// GET /auth/callback
///
/// # Security
/// - State must equal the `oauth_state` cookie and be outstanding
/// - State is single-use (consumed on validation)
/// - State is checked before the code is used
async fn callback(
    State(state): State<Arc<OAuthAppState>>,
    jar: CookieJar,
    Query(callback): Query<OAuthCallback>,
) -> Result<(CookieJar, Json<OAuthSuccessResponse>), AppError> {
    if let Some(error) = callback.error {
        let description = callback
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(error = %error, description = %description, "OAuth authorization failed");
        return Err(AppError::BadRequest(format!(
            "OAuth authorization failed: {} - {}",
            error, description
        )));
    }

    let csrf_state = callback.state.unwrap_or_default();
    // Consume first so a token seen once can never be replayed, matched or not.
    let outstanding = state.state_manager.validate_and_consume(&csrf_state);
    let cookie_matches = jar
        .get(STATE_COOKIE)
        .is_some_and(|cookie| !csrf_state.is_empty() && cookie.value() == csrf_state);

    if !(outstanding && cookie_matches) {
        warn!(outstanding, cookie_matches, "Rejected OAuth callback state");
        return Err(AppError::BadRequest(
            "Invalid or expired OAuth state (possible CSRF attack)".to_string(),
        ));
    }
    debug!("CSRF state validated");

    let code = callback
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'code' parameter".to_string()))?;

    let identity = state
        .tenants
        .complete_oauth_exchange(&code)
        .await
        .ok_or_else(|| AppError::BadRequest("Authentication failed".to_string()))?;

    info!(tenant = %identity.redacted(), "OAuth flow completed successfully");

    let jar = jar.remove(Cookie::build(STATE_COOKIE).path(COOKIE_PATH));
    Ok((
        jar,
        Json(OAuthSuccessResponse {
            success: true,
            email: identity.as_str().to_string(),
        }),
    ))
}
