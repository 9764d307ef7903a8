//! Error types for the avatar gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the avatar gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Frame similarity gate error
    #[error("gate error: {0}")]
    Gate(String),

    /// Camera / frame source error
    #[error("camera error: {0}")]
    Camera(String),

    /// Image decode error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Text generation error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Streaming avatar service error
    #[error("avatar error: {0}")]
    Avatar(String),

    /// Access token error
    #[error("token error: {0}")]
    Token(String),

    /// Session lifecycle error
    #[error("session error: {0}")]
    Session(String),

    /// A session is already starting or running
    #[error("session already {0}")]
    SessionActive(crate::session::SessionState),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
