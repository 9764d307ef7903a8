//! Request, task and event types exchanged with the streaming avatar service

use serde::{Deserialize, Serialize};

/// Default avatar identity
pub const DEFAULT_AVATAR_NAME: &str = "Katya_Black_Suit_public";

/// Default knowledge base attached to the avatar
pub const DEFAULT_KNOWLEDGE_ID: &str = "6d17dbd4ae3347c3bed2677e2893db58";

/// Default voice model
pub const DEFAULT_VOICE_MODEL: &str = "eleven_flash_v2_5";

/// Rendered video quality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarQuality {
    #[default]
    Low,
    Medium,
    High,
}

/// Emotional tone of the synthesized voice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEmotion {
    #[default]
    Excited,
    Serious,
    Friendly,
    Soothing,
    Broadcaster,
}

/// Media transport used for the voice chat leg
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceChatTransport {
    #[default]
    LiveKit,
    WebSocket,
}

/// Speech-to-text provider used by the avatar service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    #[default]
    Deepgram,
    Gladia,
}

/// Voice parameters for the avatar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSetting {
    pub rate: f32,
    pub emotion: VoiceEmotion,
    pub model: String,
}

impl Default for VoiceSetting {
    fn default() -> Self {
        Self {
            rate: 1.5,
            emotion: VoiceEmotion::Excited,
            model: DEFAULT_VOICE_MODEL.to_string(),
        }
    }
}

/// Speech-to-text settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SttSettings {
    pub provider: SttProvider,
}

/// Configuration bundle used to open a streaming session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartAvatarRequest {
    pub quality: AvatarQuality,
    pub avatar_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_id: Option<String>,
    pub voice: VoiceSetting,
    pub language: String,
    pub voice_chat_transport: VoiceChatTransport,
    pub stt_settings: SttSettings,
}

impl Default for StartAvatarRequest {
    fn default() -> Self {
        Self {
            quality: AvatarQuality::Low,
            avatar_name: DEFAULT_AVATAR_NAME.to_string(),
            knowledge_id: Some(DEFAULT_KNOWLEDGE_ID.to_string()),
            voice: VoiceSetting::default(),
            language: "en".to_string(),
            voice_chat_transport: VoiceChatTransport::LiveKit,
            stt_settings: SttSettings::default(),
        }
    }
}

/// How the avatar treats the task text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Respond to the text conversationally
    Talk,
    /// Read the text back verbatim
    Repeat,
}

/// Whether the task call waits for playback to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Sync,
    Async,
}

/// A "speak" task sent to a live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeakTask {
    pub text: String,
    pub task_type: TaskType,
    pub task_mode: TaskMode,
}

impl SpeakTask {
    /// Asynchronous talk task, the form used for generated replies
    #[must_use]
    pub fn talk(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            task_type: TaskType::Talk,
            task_mode: TaskMode::Async,
        }
    }
}

/// Events emitted by a live avatar session
///
/// Delivered by the browser-side SDK bridge as JSON tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvatarEvent {
    /// Partial transcription of the user's speech
    UserTalkingMessage { message: String },
    /// Partial text of what the avatar is saying
    AvatarTalkingMessage { message: String },
    /// The user stopped speaking
    UserEndMessage,
    /// The avatar finished its utterance
    AvatarEndMessage,
    /// Media stream is ready for playback
    StreamReady,
    /// Remote side dropped the stream
    StreamDisconnected,
}
