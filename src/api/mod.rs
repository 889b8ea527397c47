//! HTTP surface: OAuth handshake, voice tool endpoints, admin and status routes.

pub mod admin;
pub mod direct;
pub mod oauth;
pub mod status;
pub mod tools;
pub mod webhook;

pub use admin::{create_admin_router, AdminAppState};
pub use direct::{create_direct_router, DirectAppState};
pub use oauth::{create_oauth_router, OAuthAppState};
pub use status::{create_status_router, StatusAppState};
pub use tools::{create_tools_router, ToolsAppState};
pub use webhook::create_webhook_router;

use crate::bookings::BookingLog;
use crate::oauth::{OAuthProviderConfig, StateManager};
use crate::tools::Scheduler;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Everything the routers share.
#[derive(Clone)]
pub struct AppComponents {
    pub scheduler: Scheduler,
    pub bookings: Arc<BookingLog>,
    pub state_manager: StateManager,
    pub provider: OAuthProviderConfig,
    pub admin_token: Option<String>,
    pub secure_cookies: bool,
}

/// Full application router with tracing and CORS.
pub fn create_app(components: AppComponents) -> Router {
    let resolver = components.scheduler.resolver();
    let tenants = Arc::clone(resolver.tenants());
    let default_holder = Arc::clone(resolver.default_holder());

    Router::new()
        .merge(create_oauth_router(OAuthAppState {
            tenants: Arc::clone(&tenants),
            state_manager: components.state_manager,
            provider: components.provider,
            secure_cookies: components.secure_cookies,
        }))
        .merge(create_tools_router(ToolsAppState {
            scheduler: components.scheduler.clone(),
        }))
        .merge(create_direct_router(DirectAppState {
            scheduler: components.scheduler.clone(),
        }))
        .merge(create_status_router(StatusAppState {
            default_holder,
            bookings: components.bookings,
            agent_name: components.scheduler.settings().agent_name.clone(),
        }))
        .merge(create_admin_router(AdminAppState {
            tenants,
            admin_token: components.admin_token,
        }))
        .merge(create_webhook_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP-level failures shared by the routers
#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    ServerError(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}
