use std::sync::Arc;

use aisim_core::model::Session;
use aisim_core::placeholders::{fetch_placeholders, initial_placeholders};
use aisim_core::store::{Direction, StoreSnapshot};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/placeholders", get(placeholders))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{index}/select", post(select_session))
        .route("/api/focus", post(focus))
        .route("/api/navigate", post(navigate))
        .route(
            "/api/variations",
            post(start_variations).delete(close_variations),
        )
        .route("/api/variations/{index}/apply", post(apply_variation))
}

// -- Request/Response types --

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct FocusRequest {
    #[serde(default)]
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub direction: Direction,
}

/// Snapshot plus the derived navigation flags the front-end needs for its arrows.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    pub snapshot: StoreSnapshot,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

impl From<StoreSnapshot> for StateResponse {
    fn from(snapshot: StoreSnapshot) -> Self {
        Self {
            can_go_back: snapshot.can_go_back(),
            can_go_forward: snapshot.can_go_forward(),
            snapshot,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NavigateResponse {
    pub moved: bool,
    #[serde(flatten)]
    pub state: StateResponse,
}

#[derive(Debug, Serialize)]
pub struct VariationsStarted {
    pub artifact_id: String,
}

#[derive(Debug, Serialize)]
pub struct PlaceholdersResponse {
    pub placeholders: Vec<String>,
}

const NO_MODEL: &str = "no text model configured; set an API key for the configured provider";

// -- Handlers --

async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(state.store.snapshot().into())
}

async fn placeholders(State(state): State<Arc<AppState>>) -> Json<PlaceholdersResponse> {
    let placeholders = match &state.model {
        Some(model) => {
            fetch_placeholders(model.as_ref(), state.config.generation.placeholder_count).await
        }
        None => initial_placeholders(),
    };
    Json(PlaceholdersResponse { placeholders })
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let generator = state
        .generator()
        .ok_or_else(|| ApiError::service_unavailable(NO_MODEL))?;
    let session = state.store.start_session(&req.prompt)?;

    let started = session.clone();
    tokio::spawn(async move {
        generator.run(&started).await;
    });

    Ok((StatusCode::ACCEPTED, Json(session)))
}

async fn select_session(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<StateResponse>, ApiError> {
    state.store.select_session(index)?;
    Ok(Json(state.store.snapshot().into()))
}

async fn focus(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FocusRequest>,
) -> Result<Json<StateResponse>, ApiError> {
    match req.index {
        Some(index) => state.store.focus(index)?,
        None => state.store.unfocus(),
    }
    Ok(Json(state.store.snapshot().into()))
}

async fn navigate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NavigateRequest>,
) -> Json<NavigateResponse> {
    let moved = state.store.navigate(req.direction);
    Json(NavigateResponse {
        moved,
        state: state.store.snapshot().into(),
    })
}

async fn start_variations(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<VariationsStarted>), ApiError> {
    let pipeline = state
        .variations()
        .ok_or_else(|| ApiError::service_unavailable(NO_MODEL))?;
    let target = pipeline.open_focused()?;
    let artifact_id = target.artifact_id.clone();

    tokio::spawn(async move {
        if let Err(e) = pipeline.fill(&target).await {
            tracing::debug!(artifact_id = %target.artifact_id, "variations ended early: {e}");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(VariationsStarted { artifact_id })))
}

async fn close_variations(State(state): State<Arc<AppState>>) -> StatusCode {
    state.store.close_variations();
    StatusCode::NO_CONTENT
}

async fn apply_variation(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<StateResponse>, ApiError> {
    state.store.apply_variation(index)?;
    Ok(Json(state.store.snapshot().into()))
}
