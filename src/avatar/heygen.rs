//! `HeyGen` streaming avatar REST client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::token::TokenIssuer;
use super::types::{
    AvatarQuality, SpeakTask, StartAvatarRequest, SttSettings, VoiceChatTransport, VoiceSetting,
};
use super::{AvatarService, AvatarSession};
use crate::{Error, Result};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.heygen.com";

/// Client for the `HeyGen` streaming API
///
/// Holds the account API key, which is only needed to mint session tokens;
/// every session call authenticates with the token itself.
pub struct HeyGenClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HeyGenClient {
    /// Create a client
    ///
    /// Without an API key the client can still drive sessions opened with
    /// tokens issued elsewhere, but cannot issue tokens itself.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1/{method}", self.base_url)
    }

    /// POST a JSON body with a session token and return the raw envelope
    async fn post<B, T>(&self, method: &str, token: &SecretString, body: &B) -> Result<Envelope<T>>
    where
        B: Serialize + Sync,
        T: for<'de> Deserialize<'de> + Send,
    {
        let response = self
            .client
            .post(self.endpoint(method))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(method, error = %e, "avatar request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(method, status = %status, body = %body, "avatar API error");
            return Err(Error::Avatar(format!("{method} failed with {status}: {body}")));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Envelope::empty());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Call a method whose response carries a `data` payload
    async fn call<B, T>(&self, method: &str, token: &SecretString, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: for<'de> Deserialize<'de> + Send,
    {
        self.post(method, token, body).await?.into_data(method)
    }

    /// Call a method where only success matters
    async fn send<B>(&self, method: &str, token: &SecretString, body: &B) -> Result<()>
    where
        B: Serialize + Sync,
    {
        self.post::<B, serde_json::Value>(method, token, body)
            .await?
            .check(method)
    }
}

#[async_trait]
impl TokenIssuer for HeyGenClient {
    async fn issue(&self) -> Result<SecretString> {
        let Some(api_key) = &self.api_key else {
            return Err(Error::Token("HeyGen API key not configured".to_string()));
        };

        let response = self
            .client
            .post(self.endpoint("streaming.create_token"))
            .header("x-api-key", api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Token(format!("create_token failed with {status}: {body}")));
        }

        let envelope: Envelope<TokenData> = response.json().await?;
        let data = envelope.into_data("streaming.create_token")?;
        tracing::debug!("issued avatar access token");
        Ok(SecretString::from(data.token))
    }
}

#[async_trait]
impl AvatarService for HeyGenClient {
    async fn open(
        &self,
        token: &SecretString,
        request: &StartAvatarRequest,
    ) -> Result<AvatarSession> {
        let body = NewSessionRequest::from(request);
        let info: NewSessionData = self.call("streaming.new", token, &body).await?;

        tracing::info!(
            session_id = %info.session_id,
            avatar = %request.avatar_name,
            "avatar session created"
        );

        let session_ref = SessionRef {
            session_id: &info.session_id,
        };
        if let Err(e) = self.send("streaming.start", token, &session_ref).await {
            // The session exists remotely even though it never started
            if let Err(stop_error) = self.send("streaming.stop", token, &session_ref).await {
                tracing::warn!(
                    session_id = %info.session_id,
                    error = %stop_error,
                    "failed to stop unstarted avatar session"
                );
            }
            return Err(e);
        }

        Ok(AvatarSession {
            session_id: info.session_id,
            url: info.url,
            access_token: info.access_token,
            token: SecretString::from(token.expose_secret().to_string()),
        })
    }

    async fn speak(&self, session: &AvatarSession, task: &SpeakTask) -> Result<()> {
        let body = TaskRequest {
            session_id: &session.session_id,
            task,
        };
        self.send("streaming.task", &session.token, &body).await?;
        tracing::debug!(session_id = %session.session_id, chars = task.text.len(), "speak task sent");
        Ok(())
    }

    async fn close(&self, session: &AvatarSession) -> Result<()> {
        self.send(
            "streaming.stop",
            &session.token,
            &SessionRef {
                session_id: &session.session_id,
            },
        )
        .await?;
        tracing::info!(session_id = %session.session_id, "avatar session stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "heygen"
    }
}

/// Response envelope shared by all streaming endpoints
#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> Envelope<T> {
    const fn empty() -> Self {
        Self {
            data: None,
            error: None,
            message: None,
        }
    }

    fn check(&self, method: &str) -> Result<()> {
        match &self.error {
            Some(error) if !error.is_null() => Err(Error::Avatar(format!("{method}: {error}"))),
            _ => Ok(()),
        }
    }

    fn into_data(self, method: &str) -> Result<T> {
        self.check(method)?;
        self.data.ok_or_else(|| {
            Error::Avatar(format!(
                "{method}: missing data ({})",
                self.message.unwrap_or_default()
            ))
        })
    }
}

#[derive(Deserialize)]
struct TokenData {
    token: String,
}

#[derive(Serialize)]
struct NewSessionRequest<'a> {
    quality: AvatarQuality,
    avatar_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    knowledge_base_id: Option<&'a str>,
    voice: &'a VoiceSetting,
    language: &'a str,
    version: &'static str,
    video_encoding: &'static str,
    voice_chat_transport: VoiceChatTransport,
    stt_settings: SttSettings,
}

impl<'a> From<&'a StartAvatarRequest> for NewSessionRequest<'a> {
    fn from(request: &'a StartAvatarRequest) -> Self {
        Self {
            quality: request.quality,
            avatar_name: &request.avatar_name,
            knowledge_base_id: request.knowledge_id.as_deref(),
            voice: &request.voice,
            language: &request.language,
            version: "v2",
            video_encoding: "H264",
            voice_chat_transport: request.voice_chat_transport,
            stt_settings: request.stt_settings,
        }
    }
}

#[derive(Deserialize)]
struct NewSessionData {
    session_id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Serialize)]
struct SessionRef<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
struct TaskRequest<'a> {
    session_id: &'a str,
    #[serde(flatten)]
    task: &'a SpeakTask,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_request_carries_knowledge_base() {
        let request = StartAvatarRequest::default();
        let json = serde_json::to_value(NewSessionRequest::from(&request)).unwrap();

        assert_eq!(json["avatar_name"], "Katya_Black_Suit_public");
        assert_eq!(json["knowledge_base_id"], "6d17dbd4ae3347c3bed2677e2893db58");
        assert_eq!(json["quality"], "low");
        assert_eq!(json["voice"]["emotion"], "excited");
        assert_eq!(json["voice_chat_transport"], "livekit");
        assert_eq!(json["stt_settings"]["provider"], "deepgram");
        assert_eq!(json["version"], "v2");
    }

    #[test]
    fn task_request_flattens_speak_task() {
        let task = SpeakTask::talk("hello there");
        let json = serde_json::to_value(TaskRequest {
            session_id: "s1",
            task: &task,
        })
        .unwrap();

        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["text"], "hello there");
        assert_eq!(json["task_type"], "talk");
    }

    #[test]
    fn envelope_error_wins_over_data() {
        let envelope: Envelope<TokenData> =
            serde_json::from_str(r#"{"error":{"code":401},"data":{"token":"t"}}"#).unwrap();
        assert!(envelope.into_data("streaming.create_token").is_err());

        let ok: Envelope<TokenData> =
            serde_json::from_str(r#"{"error":null,"data":{"token":"t"}}"#).unwrap();
        assert_eq!(ok.into_data("streaming.create_token").unwrap().token, "t");
    }

    #[test]
    fn envelope_without_data_key() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"message":"ok"}"#).unwrap();
        assert!(envelope.check("streaming.stop").is_ok());
        assert!(envelope.into_data("streaming.stop").is_err());

        let missing: Envelope<TokenData> = serde_json::from_str(r#"{"error":null}"#).unwrap();
        assert!(missing.into_data("streaming.create_token").is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HeyGenClient::new("https://example.test/", None);
        assert_eq!(
            client.endpoint("streaming.new"),
            "https://example.test/v1/streaming.new"
        );
    }

    #[tokio::test]
    async fn issuing_without_api_key_fails() {
        let client = HeyGenClient::new(DEFAULT_BASE_URL, None);
        assert!(matches!(client.issue().await, Err(Error::Token(_))));
    }
}
