use super::AppError;
use crate::bookings::{Booking, BookingLog};
use crate::default_client::DefaultCredentialHolder;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

const DEFAULT_BOOKINGS_LIMIT: u32 = 20;
const MAX_BOOKINGS_LIMIT: u32 = 100;

/// State for health and booking feed endpoints.
#[derive(Clone)]
pub struct StatusAppState {
    pub default_holder: Arc<DefaultCredentialHolder>,
    pub bookings: Arc<BookingLog>,
    pub agent_name: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    agent: String,
    /// Whether the default calendar credential is usable
    calendar_connected: bool,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct BookingsParams {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct BookingsResponse {
    bookings: Vec<Booking>,
    count: usize,
}

pub fn create_status_router(state: StatusAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/bookings", get(list_bookings))
        .with_state(Arc::new(state))
}

/// GET /health
async fn health(State(state): State<Arc<StatusAppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agent: state.agent_name.clone(),
        calendar_connected: state.default_holder.is_valid().await,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// GET /api/bookings?limit=N
async fn list_bookings(
    State(state): State<Arc<StatusAppState>>,
    Query(params): Query<BookingsParams>,
) -> Result<Json<BookingsResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_BOOKINGS_LIMIT)
        .clamp(1, MAX_BOOKINGS_LIMIT);

    let log = Arc::clone(&state.bookings);
    let bookings = tokio::task::spawn_blocking(move || log.recent(limit))
        .await
        .map_err(|e| AppError::ServerError(format!("Booking query task failed: {}", e)))?
        .map_err(|e| {
            error!(error = %e, "Failed to list bookings");
            AppError::ServerError("Failed to list bookings".to_string())
        })?;

    Ok(Json(BookingsResponse {
        count: bookings.len(),
        bookings,
    }))
}
