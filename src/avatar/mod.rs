//! Streaming avatar service
//!
//! The avatar vendor renders video and speech; this crate only drives its
//! REST control plane:
//! - issuing short-lived access tokens
//! - opening and closing streaming sessions
//! - sending "speak" tasks to a live session
//!
//! Media (WebRTC/LiveKit) stays between the vendor and the browser. Session
//! events come back in as [`AvatarEvent`]s.

mod heygen;
mod token;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::RwLock;

pub use heygen::{DEFAULT_BASE_URL, HeyGenClient};
pub use token::{HttpTokenIssuer, TokenIssuer};
pub use types::{
    AvatarEvent, AvatarQuality, DEFAULT_AVATAR_NAME, DEFAULT_KNOWLEDGE_ID, DEFAULT_VOICE_MODEL,
    SpeakTask, StartAvatarRequest, SttProvider, SttSettings, TaskMode, TaskType,
    VoiceChatTransport, VoiceEmotion, VoiceSetting,
};

use crate::Result;

/// A live session opened on the avatar service
#[derive(Debug)]
pub struct AvatarSession {
    /// Vendor session identifier
    pub session_id: String,
    /// Media server URL the browser joins
    pub url: Option<String>,
    /// Media access token handed to the browser
    pub access_token: Option<String>,
    /// Credential used for control-plane calls on this session
    pub token: SecretString,
}

/// Handle to the currently live session, if any
///
/// Written only by the session lifecycle; readers treat `None` as
/// "no live session".
pub type SharedSession = Arc<RwLock<Option<Arc<AvatarSession>>>>;

/// Control plane of a streaming avatar service
#[async_trait]
pub trait AvatarService: Send + Sync {
    /// Create and start a streaming session
    ///
    /// # Errors
    ///
    /// Returns error if the service rejects the token or the request
    async fn open(&self, token: &SecretString, request: &StartAvatarRequest)
    -> Result<AvatarSession>;

    /// Send a speak task to a live session
    ///
    /// # Errors
    ///
    /// Returns error if the task is rejected
    async fn speak(&self, session: &AvatarSession, task: &SpeakTask) -> Result<()>;

    /// Stop a session and release its media resources
    ///
    /// # Errors
    ///
    /// Returns error if the stop call fails
    async fn close(&self, session: &AvatarSession) -> Result<()>;

    /// Service name for logging
    fn name(&self) -> &'static str;
}
