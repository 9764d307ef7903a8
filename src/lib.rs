//! Avatar Gateway - camera-gated talking avatar for hosted conversational avatars
//!
//! This library provides the core functionality for the avatar gateway:
//! - Frame similarity gate against reference photos
//! - Chat turn aggregation from streaming transcription events
//! - Reply generation and speech on the live avatar session
//! - Session lifecycle against the streaming avatar service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │          Browser (video, mic, SDK bridge)           │
//! └────────────────────┬────────────────────────────────┘
//!                      │  events / control (HTTP)
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Avatar Gateway                      │
//! │   Gate  │  Session  │  Turn Aggregator  │  Replies  │
//! └──────────┬──────────────────────────┬───────────────┘
//!            │                          │
//! ┌──────────▼──────────┐   ┌───────────▼───────────────┐
//! │  Streaming avatar   │   │    Text generation        │
//! │  service (REST)     │   │    (Gemini / proxy)       │
//! └─────────────────────┘   └───────────────────────────┘
//! ```

pub mod api;
pub mod avatar;
pub mod chat;
pub mod config;
pub mod daemon;
pub mod error;
pub mod gate;
pub mod llm;
pub mod reply;
pub mod session;

pub use avatar::{AvatarEvent, AvatarService, StartAvatarRequest, TokenIssuer};
pub use chat::{ChatTurn, ConversationInput, ConversationSnapshot, MessageSender, TurnAggregator};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use gate::{GateDecision, GateWatcher, evaluate};
pub use llm::{GenerationRequest, TextGenerator};
pub use reply::{ReplyOrchestrator, ReplyOutcome};
pub use session::{SessionLifecycle, SessionState, SessionStatus};
