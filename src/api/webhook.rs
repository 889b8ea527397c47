//! Call lifecycle webhook. Logs what the voice platform reports and always
//! acknowledges.

use axum::{body::Bytes, response::Json, routing::post, Router};
use serde_json::{json, Value};
use tracing::info;

const SUMMARY_LOG_CHARS: usize = 200;

pub fn create_webhook_router() -> Router {
    Router::new().route("/api/webhook/vapi", post(vapi_webhook))
}

/// POST /api/webhook/vapi
async fn vapi_webhook(body: Bytes) -> Json<Value> {
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let message = payload.get("message");
    let event_type = message
        .and_then(|m| m.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    if event_type == "end-of-call-report" {
        let field = |name: &str| message.and_then(|m| m.get(name)).cloned().unwrap_or(Value::Null);
        let summary: String = message
            .and_then(|m| m.get("summary"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .chars()
            .take(SUMMARY_LOG_CHARS)
            .collect();
        info!(
            event_type,
            duration = %field("duration"),
            cost = %field("cost"),
            summary = %summary,
            "Call ended"
        );
    } else {
        info!(event_type, "Voice platform event");
    }

    Json(json!({"status": "ok"}))
}
