//! Reply orchestration: text generation, then speech on the live session

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::avatar::{AvatarService, SharedSession, SpeakTask};
use crate::chat::ChatTurn;
use crate::llm::{ChatMessage, GenerationRequest, TextGenerator};

/// What happened to one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Reply generated and handed to the avatar
    Spoken { chars: usize },
    /// The model returned nothing to say
    SkippedEmpty,
    /// No live session to speak on
    SkippedNoSession,
    /// Generation or speak call failed
    Failed(String),
    /// Abandoned before completion, result discarded
    Cancelled,
}

impl ReplyOutcome {
    /// Error message for failed replies
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Turns a completed user utterance into avatar speech
///
/// Failures are logged and reported as [`ReplyOutcome::Failed`]; nothing is
/// retried and turn history is left alone.
#[derive(Clone)]
pub struct ReplyOrchestrator {
    generator: Arc<dyn TextGenerator>,
    avatar: Arc<dyn AvatarService>,
    session: SharedSession,
    forward_history: bool,
}

impl ReplyOrchestrator {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        avatar: Arc<dyn AvatarService>,
        session: SharedSession,
        forward_history: bool,
    ) -> Self {
        Self {
            generator,
            avatar,
            session,
            forward_history,
        }
    }

    /// Generate a reply to `utterance` and speak it, unless `cancel` fires first
    pub async fn generate_and_speak(
        &self,
        utterance: &str,
        history: &[ChatTurn],
        cancel: &CancellationToken,
    ) -> ReplyOutcome {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("reply cancelled");
                ReplyOutcome::Cancelled
            }
            outcome = self.reply(utterance, history) => outcome,
        }
    }

    async fn reply(&self, utterance: &str, history: &[ChatTurn]) -> ReplyOutcome {
        let history = if self.forward_history {
            history.iter().map(ChatMessage::from).collect()
        } else {
            Vec::new()
        };
        let request = GenerationRequest::new(utterance).with_history(history);

        tracing::info!(
            generator = self.generator.name(),
            chars = utterance.len(),
            history = request.history.len(),
            "generating reply"
        );

        let reply = match self.generator.generate(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(generator = self.generator.name(), error = %e, "reply generation failed");
                return ReplyOutcome::Failed(e.to_string());
            }
        };

        let text = reply.trim();
        if text.is_empty() {
            tracing::info!("empty reply, nothing to speak");
            return ReplyOutcome::SkippedEmpty;
        }

        let session = self.session.read().await.clone();
        let Some(session) = session else {
            tracing::warn!("no live avatar session, reply not spoken");
            return ReplyOutcome::SkippedNoSession;
        };

        match self.avatar.speak(&session, &SpeakTask::talk(text)).await {
            Ok(()) => {
                tracing::info!(session_id = %session.session_id, chars = text.len(), "reply sent to avatar");
                ReplyOutcome::Spoken { chars: text.len() }
            }
            Err(e) => {
                tracing::error!(
                    service = self.avatar.name(),
                    session_id = %session.session_id,
                    error = %e,
                    "speak task failed"
                );
                ReplyOutcome::Failed(e.to_string())
            }
        }
    }
}
