//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use avatar_gateway::avatar::{
    AvatarService, AvatarSession, SharedSession, SpeakTask, StartAvatarRequest, TokenIssuer,
};
use avatar_gateway::llm::{GenerationRequest, TextGenerator};
use avatar_gateway::session::SessionLifecycle;
use avatar_gateway::{Error, Result};
use secrecy::SecretString;
use tokio::sync::RwLock;

/// Text generator with a canned reply
pub struct FakeGenerator {
    reply: std::result::Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().map_err(Error::Llm)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Avatar service that records what it was asked to do
#[derive(Default)]
pub struct FakeAvatar {
    open_delay: Duration,
    fail_open: bool,
    fail_speak: bool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    spoken: Mutex<Vec<SpeakTask>>,
}

impl FakeAvatar {
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn slow_open(delay: Duration) -> Self {
        Self {
            open_delay: delay,
            ..Self::default()
        }
    }

    pub fn failing_speak() -> Self {
        Self {
            fail_speak: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|task| task.text.clone())
            .collect()
    }
}

#[async_trait]
impl AvatarService for FakeAvatar {
    async fn open(
        &self,
        _token: &SecretString,
        _request: &StartAvatarRequest,
    ) -> Result<AvatarSession> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.fail_open {
            return Err(Error::Avatar("session quota exceeded".to_string()));
        }
        let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(test_session(&format!("session-{n}")))
    }

    async fn speak(&self, _session: &AvatarSession, task: &SpeakTask) -> Result<()> {
        if self.fail_speak {
            return Err(Error::Avatar("task rejected".to_string()));
        }
        self.spoken.lock().unwrap().push(task.clone());
        Ok(())
    }

    async fn close(&self, _session: &AvatarSession) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake-avatar"
    }
}

/// Token issuer with a fixed answer
pub struct FakeTokenIssuer {
    token: Option<String>,
    delay: Duration,
}

impl FakeTokenIssuer {
    pub fn ok(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            token: None,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl TokenIssuer for FakeTokenIssuer {
    async fn issue(&self) -> Result<SecretString> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.token
            .clone()
            .map(SecretString::from)
            .ok_or_else(|| Error::Token("token endpoint returned 401".to_string()))
    }
}

/// A session handle as returned by the avatar service
pub fn test_session(id: &str) -> AvatarSession {
    AvatarSession {
        session_id: id.to_string(),
        url: Some("wss://media.example.test".to_string()),
        access_token: Some("media-token".to_string()),
        token: SecretString::from("session-token".to_string()),
    }
}

/// A shared handle holding a live session
pub fn live_session(id: &str) -> SharedSession {
    Arc::new(RwLock::new(Some(Arc::new(test_session(id)))))
}

/// Build a session lifecycle around fakes
pub fn lifecycle(
    tokens: Arc<FakeTokenIssuer>,
    avatar: Arc<FakeAvatar>,
    generator: Arc<FakeGenerator>,
    forward_history: bool,
) -> SessionLifecycle {
    SessionLifecycle::new(tokens, avatar, generator, forward_history)
}

/// Poll `check` until it yields a value or five seconds pass
pub async fn eventually<T, F, Fut>(mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(value) = check().await {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}
