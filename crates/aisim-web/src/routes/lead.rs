use std::sync::Arc;

use aisim_core::tracking::{InteractionEvent, InteractionKind, LeadChatReply, LeadChatRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/interactions", post(track_interaction))
        .route("/api/lead/chat", post(lead_chat))
        .route("/api/lead/checkout", post(checkout))
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub asset_id: String,
    pub kind: InteractionKind,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub lead_id: String,
    pub asset_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

/// Fire and forget: the browser never waits on the webhook.
async fn track_interaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InteractionRequest>,
) -> StatusCode {
    let mut event = InteractionEvent::new(req.asset_id, req.kind);
    if let Some(data) = req.data {
        event.data = data;
    }
    let tracker = state.tracker.clone();
    tokio::spawn(async move { tracker.track_interaction(&event).await });
    StatusCode::ACCEPTED
}

async fn lead_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LeadChatRequest>,
) -> Result<Json<LeadChatReply>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    if !state.tracker.is_configured() {
        return Err(ApiError::service_unavailable("lead relay is not configured"));
    }
    state
        .tracker
        .lead_relay()
        .send_chat_message(&req)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::internal("lead relay did not answer"))
}

async fn checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    if !state.tracker.is_configured() {
        return Err(ApiError::service_unavailable("lead relay is not configured"));
    }
    state
        .tracker
        .lead_relay()
        .create_checkout(&req.lead_id, &req.asset_id)
        .await
        .map(|checkout_url| Json(CheckoutResponse { checkout_url }))
        .ok_or_else(|| ApiError::internal("checkout link could not be created"))
}
