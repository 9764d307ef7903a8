//! Avatar access token endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use secrecy::ExposeSecret;
use serde_json::json;

use super::ApiState;

/// Build token router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/get-access-token", post(get_access_token))
        .with_state(state)
}

/// Issue a short-lived avatar token, returned as plain text
async fn get_access_token(State(state): State<Arc<ApiState>>) -> Result<Response, TokenError> {
    let token = state.token_issuer.issue().await.map_err(|e| {
        tracing::error!(error = %e, "failed to issue access token");
        TokenError(e.to_string())
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        token.expose_secret().to_string(),
    )
        .into_response())
}

/// Token could not be issued
#[derive(Debug)]
pub struct TokenError(String);

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("failed to retrieve access token: {}", self.0) })),
        )
            .into_response()
    }
}
