//! JSON booking endpoint for manual testing without the voice platform.
//!
//! Runs the same booking pipeline as the `schedule_event` tool but answers
//! with HTTP statuses and structured bodies instead of spoken text.

use super::AppError;
use crate::calendar::{Event, EventTime};
use crate::identity::TenantIdentity;
use crate::tools::{BookingOutcome, ScheduleEventArgs, Scheduler};
use axum::{body::Bytes, extract::State, response::Json, routing::post, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct DirectAppState {
    pub scheduler: Scheduler,
}

#[derive(Debug, Serialize)]
pub struct ConflictSummary {
    summary: Option<String>,
    start: EventTime,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DirectScheduleResponse {
    Conflict { conflicts: Vec<ConflictSummary> },
    Created { event: Event },
}

pub fn create_direct_router(state: DirectAppState) -> Router {
    Router::new()
        .route("/api/direct/schedule", post(direct_schedule))
        .with_state(Arc::new(state))
}

/// POST /api/direct/schedule
async fn direct_schedule(
    State(state): State<Arc<DirectAppState>>,
    body: Bytes,
) -> Result<Json<DirectScheduleResponse>, AppError> {
    let args: ScheduleEventArgs = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;

    for (field, value) in [("name", &args.name), ("date", &args.date), ("time", &args.time)] {
        if value.trim().is_empty() {
            return Err(AppError::BadRequest(format!("'{}' must not be empty", field)));
        }
    }
    let duration = state.scheduler.duration(args.duration_minutes).ok_or_else(|| {
        AppError::BadRequest("duration_minutes must be between 5 and 480".to_string())
    })?;

    match state.scheduler.book(&args, duration).await {
        BookingOutcome::NotConnected { identity: None } => Err(AppError::Unauthorized(
            "Not authenticated. Visit /auth/login".to_string(),
        )),
        BookingOutcome::NotConnected {
            identity: Some(raw),
        } => Err(AppError::Unauthorized(match TenantIdentity::parse(&raw) {
            Ok(identity) => format!("No connected calendar for {}", identity),
            Err(_) => "No connected calendar for that identity".to_string(),
        })),
        BookingOutcome::InvalidDateTime(e) => Err(AppError::BadRequest(e.to_string())),
        BookingOutcome::Conflict(conflicts) => Ok(Json(DirectScheduleResponse::Conflict {
            conflicts: conflicts
                .into_iter()
                .map(|event| ConflictSummary {
                    summary: event.summary,
                    start: event.start,
                })
                .collect(),
        })),
        BookingOutcome::Created { event, .. } => {
            info!(event_id = ?event.id, "Direct booking created");
            Ok(Json(DirectScheduleResponse::Created { event }))
        }
        BookingOutcome::Failed => Err(AppError::BadGateway(
            "Calendar rejected the event".to_string(),
        )),
    }
}
