//! Streaming avatar session lifecycle
//!
//! Owns the live session handle and the conversation loop that feeds on the
//! session's events. State moves `Inactive → Connecting → Connected` and back
//! to `Inactive` on stop or on any start failure.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::avatar::{
    AvatarEvent, AvatarService, AvatarSession, SharedSession, StartAvatarRequest, TokenIssuer,
};
use crate::chat::{ConversationHandle, ConversationInput, ConversationLoop, ConversationSnapshot};
use crate::llm::TextGenerator;
use crate::reply::ReplyOrchestrator;
use crate::{Error, Result};

/// Connection state of the avatar session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Inactive,
    Connecting,
    Connected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Observable session status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Vendor session id while connected
    pub session_id: Option<String>,
    /// Why the most recent start failed
    pub last_error: Option<String>,
}

struct ActiveSession {
    cancel: CancellationToken,
    conversation: Option<ConversationHandle>,
}

/// Starts and stops the avatar session
pub struct SessionLifecycle {
    tokens: Arc<dyn TokenIssuer>,
    avatar: Arc<dyn AvatarService>,
    generator: Arc<dyn TextGenerator>,
    forward_history: bool,
    session: SharedSession,
    status: watch::Sender<SessionStatus>,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionLifecycle {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenIssuer>,
        avatar: Arc<dyn AvatarService>,
        generator: Arc<dyn TextGenerator>,
        forward_history: bool,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            tokens,
            avatar,
            generator,
            forward_history,
            session: SharedSession::default(),
            status,
            active: Mutex::new(None),
        }
    }

    /// Start a session with `request`
    ///
    /// A [`stop`](Self::stop) while connecting fails the start. A remote
    /// session opened in the meantime is closed before returning.
    ///
    /// # Errors
    ///
    /// Returns error if a session is already starting or running, or if the
    /// token fetch or session creation fails. On failure the state returns to
    /// `Inactive` with the error recorded in `last_error`.
    pub async fn start(&self, request: &StartAvatarRequest) -> Result<SessionStatus> {
        let mut current = SessionState::Inactive;
        let accepted = self.status.send_if_modified(|status| {
            current = status.state;
            if status.state != SessionState::Inactive {
                return false;
            }
            *status = SessionStatus {
                state: SessionState::Connecting,
                session_id: None,
                last_error: None,
            };
            true
        });
        if !accepted {
            return Err(Error::SessionActive(current));
        }

        tracing::info!(avatar = %request.avatar_name, "starting avatar session");

        let cancel = CancellationToken::new();
        *self.active.lock().await = Some(ActiveSession {
            cancel: cancel.clone(),
            conversation: None,
        });

        let opened = self.connect(request, &cancel).await;

        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "avatar session start failed");
                if !cancel.is_cancelled() {
                    self.active.lock().await.take();
                    self.status.send_modify(|status| {
                        status.state = SessionState::Inactive;
                        status.session_id = None;
                        status.last_error = Some(e.to_string());
                    });
                }
                return Err(e);
            }
        };

        let mut active = self.active.lock().await;
        if cancel.is_cancelled() {
            drop(active);
            tracing::info!(session_id = %session.session_id, "session stopped while connecting");
            self.close_remote(&session).await;
            return Err(Error::Session("session start cancelled".to_string()));
        }

        let session = Arc::new(session);
        *self.session.write().await = Some(Arc::clone(&session));

        let orchestrator = ReplyOrchestrator::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.avatar),
            Arc::clone(&self.session),
            self.forward_history,
        );
        let conversation = ConversationLoop::spawn(orchestrator, cancel.child_token());
        *active = Some(ActiveSession {
            cancel,
            conversation: Some(conversation),
        });
        self.status.send_modify(|status| {
            status.state = SessionState::Connected;
            status.session_id = Some(session.session_id.clone());
        });
        drop(active);
        tracing::info!(session_id = %session.session_id, "avatar session connected");

        Ok(self.status())
    }

    /// Issue a token and open the remote session
    ///
    /// Only the token fetch is abandoned on cancellation. An open already
    /// under way runs to completion and is closed by the caller.
    async fn connect(
        &self,
        request: &StartAvatarRequest,
        cancel: &CancellationToken,
    ) -> Result<AvatarSession> {
        let token = tokio::select! {
            () = cancel.cancelled() => {
                return Err(Error::Session("session start cancelled".to_string()));
            }
            token = self.tokens.issue() => token?,
        };
        tracing::debug!("avatar access token issued");

        if cancel.is_cancelled() {
            return Err(Error::Session("session start cancelled".to_string()));
        }
        self.avatar.open(&token, request).await
    }

    /// Stop the session, if any
    ///
    /// Cancels the conversation loop and any in-flight reply, then stops the
    /// remote session. Safe to call at any time.
    pub async fn stop(&self) {
        let active = self.active.lock().await.take();
        let session = self.session.write().await.take();

        if let Some(active) = active {
            active.cancel.cancel();
            if let Some(conversation) = active.conversation {
                drop(conversation.inputs);
                if let Err(e) = conversation.task.await {
                    tracing::warn!(error = %e, "conversation loop ended abnormally");
                }
            }
        }

        if let Some(session) = session {
            self.close_remote(&session).await;
        }

        let stopped = self.status.send_if_modified(|status| {
            if status.state == SessionState::Inactive {
                return false;
            }
            status.state = SessionState::Inactive;
            status.session_id = None;
            true
        });
        if stopped {
            tracing::info!("avatar session stopped");
        }
    }

    async fn close_remote(&self, session: &AvatarSession) {
        match self.avatar.close(session).await {
            Ok(()) => tracing::debug!(session_id = %session.session_id, "remote session closed"),
            Err(e) => tracing::warn!(
                session_id = %session.session_id,
                error = %e,
                "failed to close remote session"
            ),
        }
    }

    /// Route one input to the active conversation
    ///
    /// A stream disconnect stops the session instead.
    ///
    /// # Errors
    ///
    /// Returns error if no session is connected
    pub async fn dispatch(&self, input: ConversationInput) -> Result<()> {
        let Some(inputs) = self.events().await else {
            return Err(Error::Session("no active session".to_string()));
        };

        if input == ConversationInput::Avatar(AvatarEvent::StreamDisconnected) {
            tracing::info!("stream disconnected, stopping session");
            self.stop().await;
            return Ok(());
        }

        inputs
            .send(input)
            .await
            .map_err(|_| Error::Session("conversation loop stopped".to_string()))
    }

    /// Inbound sender of the active conversation, `None` when inactive
    pub async fn events(&self) -> Option<mpsc::Sender<ConversationInput>> {
        self.active
            .lock()
            .await
            .as_ref()
            .and_then(|active| active.conversation.as_ref())
            .map(|conversation| conversation.inputs.clone())
    }

    /// Current conversation snapshot, `None` when inactive
    pub async fn conversation(&self) -> Option<ConversationSnapshot> {
        self.active
            .lock()
            .await
            .as_ref()
            .and_then(|active| active.conversation.as_ref())
            .map(|conversation| conversation.snapshot.borrow().clone())
    }

    /// Watch the session status
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Handle to the live session, shared with reply orchestration
    #[must_use]
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }
}
