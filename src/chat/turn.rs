//! Chat turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::ChatMessage;

/// Who produced a chunk of conversation text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageSender {
    /// The person in front of the camera
    Client,
    /// The avatar
    Avatar,
}

/// A contiguous run of text from one speaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub sender: MessageSender,
    pub content: String,
    pub started_at: DateTime<Utc>,
}

impl ChatTurn {
    #[must_use]
    pub fn new(sender: MessageSender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            content: content.into(),
            started_at: Utc::now(),
        }
    }
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        match turn.sender {
            MessageSender::Client => Self::user(turn.content.clone()),
            MessageSender::Avatar => Self::assistant(turn.content.clone()),
        }
    }
}
