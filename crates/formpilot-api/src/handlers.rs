//! Route handler functions.
//!
//! Handlers are thin: they extract input, call the session registry, and
//! serialize what it returns.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use formpilot_chat::{ConversationSession, ImageReply, TurnOutcome};
use formpilot_core::types::ServiceDefinition;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session: ConversationSession,
    /// Greeting to show before the first input.
    pub greeting: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceDefinition>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.registry.len(),
    })
}

/// POST /sessions
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let session = state.registry.start_session()?;
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session,
            greeting: state.registry.greeting(),
        }),
    ))
}

/// GET /sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationSession>, ApiError> {
    Ok(Json(state.registry.session(id).await?))
}

/// DELETE /sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.registry.end_session(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /sessions/{id}/messages
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    Ok(Json(state.registry.submit_text(id, &body.text).await?))
}

/// POST /sessions/{id}/images (raw image bytes)
pub async fn post_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ImageReply>, ApiError> {
    Ok(Json(state.registry.submit_image(id, &body).await?))
}

/// POST /sessions/{id}/reset
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationSession>, ApiError> {
    Ok(Json(state.registry.reset_session(id).await?))
}

/// GET /services
pub async fn list_services(State(state): State<AppState>) -> Json<ServicesResponse> {
    Json(ServicesResponse {
        services: state.registry.catalog().iter().cloned().collect(),
    })
}
