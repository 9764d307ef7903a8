//! Chat proxy endpoint (`POST /api/chat`)
//!
//! Lets browser clients and the proxy transport reach the model without
//! holding the model API key.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};

use super::ApiState;
use crate::llm::{ChatProxyRequest, ChatProxyResponse, GenerationRequest};

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(state)
}

async fn chat(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatProxyRequest>,
) -> Result<Json<ChatProxyResponse>, ChatError> {
    let generator = state.chat.as_ref().ok_or(ChatError::NotConfigured)?;

    let generation = GenerationRequest::new(request.message).with_history(request.context);
    let text = generator.generate(&generation).await.map_err(|e| {
        tracing::error!(generator = generator.name(), error = %e, "chat proxy generation failed");
        ChatError::Failed
    })?;

    Ok(Json(ChatProxyResponse {
        response: Some(text),
        error: None,
    }))
}

/// Chat proxy errors
#[derive(Debug)]
pub enum ChatError {
    NotConfigured,
    Failed,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, "Chat model not configured"),
            Self::Failed => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate response"),
        };

        let body = ChatProxyResponse {
            response: None,
            error: Some(message.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
