//! Webhook HTTP surface — verification handshake and event delivery.
//!
//! Every recoverable outcome acknowledges with HTTP 200 so the platform
//! never retries an already-evaluated event (a retry would re-run the rules
//! and could double-post). Only genuinely malformed bodies and internal
//! faults return 5xx, where a platform retry might actually succeed.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::pipeline::Engine;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Token the platform echoes back during the GET handshake.
    pub verify_token: Arc<str>,
}

/// Build the Axum router for the webhook endpoints.
pub fn webhook_routes(engine: Arc<Engine>, verify_token: &str) -> Router {
    let state = AppState {
        engine,
        verify_token: Arc::from(verify_token),
    };

    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/health", get(health))
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "replyflow"
    }))
}

// ── GET verification handshake ──────────────────────────────────────

/// Query parameters of the platform's subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> impl IntoResponse {
    let mode_ok = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(state.verify_token.as_ref());

    if mode_ok && token_ok {
        info!("Webhook verification handshake accepted");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        warn!(
            mode = params.mode.as_deref().unwrap_or("<none>"),
            "Webhook verification rejected"
        );
        (StatusCode::FORBIDDEN, String::new())
    }
}

// ── POST event delivery ─────────────────────────────────────────────

/// The body is taken as a raw string and parsed explicitly: a body that
/// isn't JSON at all is the internal-fault class (500 — the platform may
/// retry), while recognizable-but-irrelevant payloads are a 200 "ignored".
async fn receive(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let payload: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "Webhook body is not valid JSON");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "error", "error": "malformed payload" })),
            );
        }
    };

    match state.engine.handle(&payload).await {
        Ok(outcome) => {
            info!(
                outcome = outcome.label(),
                status = outcome.status(),
                "Webhook processed"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": outcome.status(),
                    "outcome": outcome.label(),
                })),
            )
        }
        Err(e) => {
            error!(error = %e, "Pipeline failed with internal fault");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "error" })),
            )
        }
    }
}
