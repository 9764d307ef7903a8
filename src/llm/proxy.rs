//! REST proxy transport (`POST /api/chat`)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, GenerationRequest, TextGenerator};
use crate::{Error, Result};

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatProxyRequest {
    pub message: String,
    #[serde(default)]
    pub context: Vec<ChatMessage>,
}

/// Response of `POST /api/chat`
///
/// Success carries `response`; failures carry `error` with HTTP 500.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatProxyResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Generates text through a chat proxy endpoint
pub struct ChatProxyClient {
    client: reqwest::Client,
    url: String,
}

impl ChatProxyClient {
    /// Create a client for a proxy at `base_url`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    /// Full endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TextGenerator for ChatProxyClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatProxyRequest {
            message: request.utterance.clone(),
            context: request.history.clone(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %self.url, error = %e, "chat proxy request failed");
                e
            })?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: ChatProxyResponse = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(status = %status, body = %text, "unparseable chat proxy response");
            e
        })?;

        interpret(status.is_success(), parsed)
    }

    fn name(&self) -> &'static str {
        "chat-proxy"
    }
}

fn interpret(success: bool, parsed: ChatProxyResponse) -> Result<String> {
    if let Some(error) = parsed.error {
        return Err(Error::Llm(format!("chat proxy error: {error}")));
    }
    if !success {
        return Err(Error::Llm("chat proxy request failed".to_string()));
    }
    parsed
        .response
        .ok_or_else(|| Error::Llm("chat proxy response missing `response`".to_string()))
}
