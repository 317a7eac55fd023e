//! Session lifecycle routes.
//!
//! Each handler derives the actor id from the session id and forwards one
//! operation to that actor. Input is validated here so malformed requests
//! never reach an actor.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sessiond_core::{EndReason, SessionConfig, SessionState};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

/// Reason recorded when an end request does not carry one
const DEFAULT_END_REASON: &str = "requested";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/initialize", post(initialize))
        .route("/extend", post(extend))
        .route("/heartbeat", post(heartbeat))
        .route("/state/{session_id}", get(get_state))
        .route("/cleanup/{session_id}", post(cleanup))
        .route("/end", post(end))
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub session_id: Option<String>,
    pub max_duration: Option<i64>,
    pub max_idle_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndRequest {
    pub session_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub success: bool,
    pub session_id: String,
    pub config: SessionConfig,
    pub expires_at: i64,
    pub next_idle_check: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub success: bool,
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndResponse {
    pub success: bool,
    pub session_id: String,
    pub message: String,
}

/// Non-empty session id or a 400
fn require_session_id(session_id: Option<String>) -> Result<String, ApiError> {
    match session_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ApiError::BadRequest("sessionId is required".to_string())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Create or overwrite a session
async fn initialize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InitializeRequest>, JsonRejection>,
) -> Result<Json<InitializeResponse>, ApiError> {
    let Json(req) = payload?;
    let session_id = require_session_id(req.session_id)?;

    let defaults = state.default_session_config();
    let config = SessionConfig {
        max_duration: req.max_duration.unwrap_or(defaults.max_duration),
        max_idle_time: req.max_idle_time.unwrap_or(defaults.max_idle_time),
    };

    let id = state.registry.id_from_name(&session_id);
    let actor = state.registry.get(&id).await;
    let result = actor.initialize(&session_id, config).await?;

    Ok(Json(InitializeResponse {
        success: true,
        session_id,
        config,
        expires_at: result.expires_at,
        next_idle_check: result.next_idle_check,
    }))
}

/// Keep a session going after an idle warning
async fn extend(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(req) = payload?;
    let session_id = require_session_id(req.session_id)?;

    let id = state.registry.id_from_name(&session_id);
    let result = state.registry.get(&id).await.extend_session().await;
    if result.is_err() {
        state.registry.evict_if_idle(&id).await;
    }
    result?;

    Ok(Json(SessionResponse {
        success: true,
        session_id,
    }))
}

/// Record activity for a session
async fn heartbeat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(req) = payload?;
    let session_id = require_session_id(req.session_id)?;

    let id = state.registry.id_from_name(&session_id);
    let result = state.registry.get(&id).await.update_activity().await;
    if result.is_err() {
        state.registry.evict_if_idle(&id).await;
    }
    result?;

    Ok(Json(SessionResponse {
        success: true,
        session_id,
    }))
}

/// Read a session's state
async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<StateResponse>, ApiError> {
    let id = state.registry.id_from_name(&session_id);
    let current = state.registry.get(&id).await.get_state().await?;

    match current {
        Some(session) => Ok(Json(StateResponse {
            success: true,
            state: session,
        })),
        None => {
            state.registry.evict_if_idle(&id).await;
            Err(ApiError::NotFound("Session not found".to_string()))
        }
    }
}

/// End and erase a session. Succeeds for unknown sessions too.
async fn cleanup(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let id = state.registry.id_from_name(&session_id);
    state.registry.get(&id).await.cleanup().await?;
    state.registry.evict_if_idle(&id).await;

    debug!(session_id = %session_id, "Session cleaned up");
    Ok(Json(SuccessResponse { success: true }))
}

/// End an existing session on request
async fn end(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EndRequest>, JsonRejection>,
) -> Result<Json<EndResponse>, ApiError> {
    let Json(req) = payload?;
    let session_id = require_session_id(req.session_id)?;
    let reason = req
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_END_REASON.to_string());

    let id = state.registry.id_from_name(&session_id);
    let result = state
        .registry
        .get(&id)
        .await
        .end(EndReason::Requested(reason.clone()))
        .await;
    state.registry.evict_if_idle(&id).await;
    result?;

    info!(session_id = %session_id, reason = %reason, "Session ended on request");
    Ok(Json(EndResponse {
        success: true,
        session_id,
        message: format!("Session ended: {}", reason),
    }))
}
