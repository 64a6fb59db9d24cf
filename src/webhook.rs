//! HTTP surface — VAPI webhook intake and health check.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::pipeline::CallProcessor;
use crate::pipeline::extractor;

/// Event type that triggers the pipeline.
pub const END_OF_CALL_REPORT: &str = "end-of-call-report";

/// Maximum accepted webhook body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state for webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub processor: Arc<CallProcessor>,
}

/// Build the webhook and health routes.
pub fn webhook_routes(processor: Arc<CallProcessor>) -> Router {
    let state = WebhookState { processor };

    Router::new()
        .route("/webhook/vapi", post(vapi_webhook))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// ── Webhook ─────────────────────────────────────────────────────────

/// POST /webhook/vapi
///
/// Always acknowledges immediately. End-of-call reports are processed on a
/// background task; every other event type is ignored.
async fn vapi_webhook(
    State(state): State<WebhookState>,
    Json(event): Json<Value>,
) -> impl IntoResponse {
    let event_type = extractor::event_type(&event).unwrap_or("unknown");
    info!(event_type = %event_type, "Webhook received");

    if event_type == END_OF_CALL_REPORT {
        state.processor.spawn(event);
    } else {
        debug!(event_type = %event_type, "Ignoring non end-of-call event");
    }

    Json(json!({ "received": true }))
}
