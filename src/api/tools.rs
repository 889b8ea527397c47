//! Voice platform tool endpoints.
//!
//! Every request gets a 200 with the platform's result envelope, whatever
//! went wrong; the agent speaks the result text to the caller.

use crate::tools::{Scheduler, Tool, ToolResponse};
use axum::{body::Bytes, extract::State, response::Json, routing::post, Router};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Shared application state for the tool endpoints
#[derive(Clone)]
pub struct ToolsAppState {
    pub scheduler: Scheduler,
}

pub fn create_tools_router(state: ToolsAppState) -> Router {
    Router::new()
        .route("/tools/api/v1/schedule-event", post(schedule_event))
        .route("/tools/api/v1/check-availability", post(check_availability))
        .route("/tools/api/v1/available-slots", post(available_slots))
        .route("/tools/api/v1/upcoming-events", post(upcoming_events))
        .with_state(Arc::new(state))
}

async fn schedule_event(State(state): State<Arc<ToolsAppState>>, body: Bytes) -> Json<ToolResponse> {
    run(&state, Tool::ScheduleEvent, &body).await
}

async fn check_availability(State(state): State<Arc<ToolsAppState>>, body: Bytes) -> Json<ToolResponse> {
    run(&state, Tool::CheckAvailability, &body).await
}

async fn available_slots(State(state): State<Arc<ToolsAppState>>, body: Bytes) -> Json<ToolResponse> {
    run(&state, Tool::AvailableSlots, &body).await
}

async fn upcoming_events(State(state): State<Arc<ToolsAppState>>, body: Bytes) -> Json<ToolResponse> {
    run(&state, Tool::UpcomingEvents, &body).await
}

/// Unparseable bodies become `null`, which carries no tool call and gets
/// the generic retry prompt.
async fn run(state: &ToolsAppState, tool: Tool, body: &[u8]) -> Json<ToolResponse> {
    let payload: Value = serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!(?tool, error = %e, "Tool request body is not JSON");
        Value::Null
    });
    Json(state.scheduler.handle(tool, &payload).await)
}
