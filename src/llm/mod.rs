//! Text generation
//!
//! One [`TextGenerator`] interface with two transports:
//! - [`GeminiClient`] calls the hosted model directly
//! - [`ChatProxyClient`] goes through a `POST /api/chat` proxy
//!
//! Whether prior turns are forwarded is decided by the caller through
//! [`GenerationRequest::history`]; both transports honour it.

mod gemini;
mod proxy;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub use gemini::{DEFAULT_BASE_URL as GEMINI_BASE_URL, DEFAULT_MODEL, GeminiClient};
pub use proxy::{ChatProxyClient, ChatProxyRequest, ChatProxyResponse};

use crate::config::{LlmConfig, LlmTransport};
use crate::{Error, Result};

/// Author of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior message forwarded as conversation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Input to a text generation call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The completed user utterance
    pub utterance: String,
    /// Prior conversation, oldest first (empty when history is not forwarded)
    pub history: Vec<ChatMessage>,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// A hosted text generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply to the request
    ///
    /// An empty string is a valid reply.
    ///
    /// # Errors
    ///
    /// Returns error if the backend call fails
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Build the generator selected by configuration
///
/// # Errors
///
/// Returns error if the direct transport is selected without an API key
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.transport {
        LlmTransport::Direct => Ok(Arc::new(build_direct(config)?)),
        LlmTransport::Proxy => Ok(Arc::new(ChatProxyClient::new(&config.proxy_url))),
    }
}

/// Build the direct hosted-model client regardless of the selected transport
///
/// The chat proxy endpoint always talks to the model directly.
///
/// # Errors
///
/// Returns error if no API key is configured
pub fn build_direct(config: &LlmConfig) -> Result<GeminiClient> {
    let api_key = config
        .api_key
        .as_ref()
        .map(|k| k.expose_secret())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            Error::Config("GEMINI_API_KEY required for direct text generation".to_string())
        })?;

    Ok(GeminiClient::new(
        SecretString::from(api_key.to_string()),
        config.model.clone(),
        config.base_url.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_transport_requires_key() {
        let config = LlmConfig {
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(matches!(build_direct(&config), Err(Error::Config(_))));
    }

    #[test]
    fn proxy_transport_needs_no_key() {
        let config = LlmConfig {
            transport: LlmTransport::Proxy,
            api_key: None,
            ..LlmConfig::default()
        };
        let generator = build_generator(&config).unwrap();
        assert_eq!(generator.name(), "chat-proxy");
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
    }
}
