//! Session control, event ingestion and read-only snapshots

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ApiState;
use crate::avatar::AvatarEvent;
use crate::chat::{ConversationInput, ConversationSnapshot};
use crate::gate::GateStatus;
use crate::Error;
use crate::session::SessionStatus;

/// Build session router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/session", get(status))
        .route("/session/start", post(start))
        .route("/session/stop", post(stop))
        .route("/session/events", post(events))
        .route("/session/text", post(text))
        .route("/session/clear", post(clear))
        .route("/session/messages", get(messages))
        .with_state(state)
}

/// Session status plus gate state
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub status: SessionStatus,
    pub gate: GateStatus,
    pub gate_open: bool,
}

fn view(state: &ApiState, status: SessionStatus) -> SessionView {
    let gate = *state.gate.borrow();
    SessionView {
        status,
        gate,
        gate_open: gate.is_open(),
    }
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<SessionView> {
    Json(view(&state, state.session.status()))
}

async fn start(State(state): State<Arc<ApiState>>) -> Result<Json<SessionView>, SessionError> {
    let status = state
        .session
        .start(&state.avatar_request)
        .await
        .map_err(|e| match e {
            Error::SessionActive(_) => SessionError::Conflict(e.to_string()),
            e => SessionError::StartFailed(e.to_string()),
        })?;

    Ok(Json(view(&state, status)))
}

async fn stop(State(state): State<Arc<ApiState>>) -> Json<SessionView> {
    state.session.stop().await;
    Json(view(&state, state.session.status()))
}

async fn events(
    State(state): State<Arc<ApiState>>,
    Json(event): Json<AvatarEvent>,
) -> Result<StatusCode, SessionError> {
    tracing::trace!(?event, "avatar event received");
    state
        .session
        .dispatch(ConversationInput::Avatar(event))
        .await
        .map_err(|e| SessionError::Conflict(e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

/// Typed user input
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

async fn text(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TextRequest>,
) -> Result<StatusCode, SessionError> {
    if request.text.trim().is_empty() {
        return Err(SessionError::BadRequest("text is empty"));
    }
    state
        .session
        .dispatch(ConversationInput::Text(request.text))
        .await
        .map_err(|e| SessionError::Conflict(e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

async fn clear(State(state): State<Arc<ApiState>>) -> Result<StatusCode, SessionError> {
    state
        .session
        .dispatch(ConversationInput::Clear)
        .await
        .map_err(|e| SessionError::Conflict(e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

async fn messages(State(state): State<Arc<ApiState>>) -> Json<ConversationSnapshot> {
    Json(state.session.conversation().await.unwrap_or_default())
}

/// Session API errors
#[derive(Debug)]
pub enum SessionError {
    BadRequest(&'static str),
    Conflict(String),
    StartFailed(String),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::StartFailed(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
