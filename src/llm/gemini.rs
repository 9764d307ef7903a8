//! Direct client for the hosted Gemini model

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatRole, GenerationRequest, TextGenerator};
use crate::{Error, Result};

/// Default Generative Language API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Calls `models/{model}:generateContent`
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiClient {
    #[must_use]
    pub fn new(api_key: SecretString, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Model identifier
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        tracing::debug!(
            model = %self.model,
            history = request.history.len(),
            "requesting Gemini reply"
        );

        let body = GenerateContentRequest::from(request);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Gemini request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Gemini API error");
            return Err(Error::Llm(format!("Gemini API error {status}: {body}")));
        }

        let result: GenerateContentResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Gemini response");
            e
        })?;

        let text = result.text();
        tracing::info!(chars = text.len(), "Gemini reply received");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

impl<'a> From<&'a GenerationRequest> for GenerateContentRequest<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        let mut contents: Vec<Content<'a>> = request
            .history
            .iter()
            .map(|m| Content {
                role: match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                },
                parts: vec![Part { text: &m.content }],
            })
            .collect();

        contents.push(Content {
            role: "user",
            parts: vec![Part {
                text: &request.utterance,
            }],
        });

        Self { contents }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    ///
    /// A response without candidates (e.g. a blocked prompt) yields "".
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
