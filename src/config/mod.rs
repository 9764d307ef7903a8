//! Configuration management for the avatar gateway
//!
//! Priority: environment > TOML file > built-in defaults.

pub mod file;

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::avatar::{self, StartAvatarRequest};
use crate::llm;
use crate::{Error, Result};

use file::GatewayConfigFile;

/// Default API server port
pub const DEFAULT_PORT: u16 = 3001;

/// Default reference image set
pub const DEFAULT_REFERENCE_IMAGES: [&str; 4] = [
    "reference-images/Image1.jpeg",
    "reference-images/Image2.jpeg",
    "reference-images/Image3.jpeg",
    "reference-images/Image4.jpeg",
];

/// Default location of the latest camera frame
pub const DEFAULT_FRAME_PATH: &str = "camera/latest.jpeg";

/// Avatar gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Session request sent when the avatar starts
    pub avatar: StartAvatarRequest,

    /// Avatar service account
    pub service: AvatarServiceConfig,

    /// Text generation
    pub llm: LlmConfig,

    /// Camera gate
    pub gate: GateConfig,

    /// HTTP API server
    pub server: ServerConfig,
}

/// Avatar service account configuration
#[derive(Debug)]
pub struct AvatarServiceConfig {
    /// REST API base URL
    pub base_url: String,

    /// Account API key (`HEYGEN_API_KEY`), needed to mint tokens locally
    pub api_key: Option<SecretString>,

    /// External `POST /api/get-access-token` endpoint
    ///
    /// When set, session tokens are fetched from here instead of being
    /// minted with `api_key`.
    pub token_url: Option<String>,
}

impl Default for AvatarServiceConfig {
    fn default() -> Self {
        Self {
            base_url: avatar::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            token_url: None,
        }
    }
}

/// Which transport the reply orchestrator uses for text generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmTransport {
    /// Call the hosted model directly
    #[default]
    Direct,
    /// Go through a `POST /api/chat` proxy
    Proxy,
}

impl std::str::FromStr for LlmTransport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "proxy" => Ok(Self::Proxy),
            other => Err(Error::Config(format!("unknown LLM transport: {other}"))),
        }
    }
}

/// Text generation configuration
#[derive(Debug)]
pub struct LlmConfig {
    pub transport: LlmTransport,

    /// Model identifier
    pub model: String,

    /// Hosted model API key (`GEMINI_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Hosted model API base URL
    pub base_url: String,

    /// Chat proxy base URL (the proxy serves `/api/chat`)
    pub proxy_url: String,

    /// Forward prior turns as conversation context
    pub forward_history: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            transport: LlmTransport::Direct,
            model: llm::DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: llm::GEMINI_BASE_URL.to_string(),
            proxy_url: format!("http://localhost:{DEFAULT_PORT}"),
            forward_history: false,
        }
    }
}

/// Camera gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Require a gate match before starting the session
    pub enabled: bool,

    /// Reference images, compared in order
    pub reference_images: Vec<PathBuf>,

    /// File holding the most recent camera frame
    pub frame_path: PathBuf,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reference_images: DEFAULT_REFERENCE_IMAGES.iter().map(PathBuf::from).collect(),
            frame_path: PathBuf::from(DEFAULT_FRAME_PATH),
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Requests per minute allowed on `/api/*`
    pub rate_limit_per_minute: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rate_limit_per_minute: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if an environment override cannot be parsed
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if an environment override cannot be parsed
    pub fn from_sources<F>(fc: GatewayConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // Avatar request (env > toml > default)
        let defaults = StartAvatarRequest::default();
        let mut voice = defaults.voice.clone();
        if let Some(rate) = parse_env(&env, "AVATAR_VOICE_RATE")?.or(fc.avatar.voice_rate) {
            voice.rate = rate;
        }
        if let Some(emotion) = fc.avatar.voice_emotion {
            voice.emotion = emotion;
        }
        if let Some(model) = env("AVATAR_VOICE_MODEL").or(fc.avatar.voice_model) {
            voice.model = model;
        }

        let avatar = StartAvatarRequest {
            quality: fc.avatar.quality.unwrap_or(defaults.quality),
            avatar_name: env("AVATAR_NAME")
                .or(fc.avatar.name)
                .unwrap_or(defaults.avatar_name),
            knowledge_id: env("AVATAR_KNOWLEDGE_ID")
                .or(fc.avatar.knowledge_id)
                .or(defaults.knowledge_id),
            voice,
            language: env("AVATAR_LANGUAGE")
                .or(fc.avatar.language)
                .unwrap_or(defaults.language),
            voice_chat_transport: fc
                .avatar
                .transport
                .unwrap_or(defaults.voice_chat_transport),
            stt_settings: avatar::SttSettings {
                provider: fc
                    .avatar
                    .stt_provider
                    .unwrap_or(defaults.stt_settings.provider),
            },
        };

        let service = AvatarServiceConfig {
            base_url: env("HEYGEN_BASE_URL")
                .or(fc.service.base_url)
                .unwrap_or_else(|| avatar::DEFAULT_BASE_URL.to_string()),
            api_key: env("HEYGEN_API_KEY")
                .or(fc.service.api_key)
                .map(SecretString::from),
            token_url: env("AVATAR_TOKEN_URL").or(fc.service.token_url),
        };

        let llm_defaults = LlmConfig::default();
        let transport = match env("AVATAR_LLM_TRANSPORT") {
            Some(raw) => raw.parse()?,
            None => fc.llm.transport.unwrap_or(llm_defaults.transport),
        };
        let llm = LlmConfig {
            transport,
            model: env("AVATAR_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(llm_defaults.model),
            api_key: env("GEMINI_API_KEY")
                .or(fc.llm.api_key)
                .map(SecretString::from),
            base_url: env("GEMINI_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or(llm_defaults.base_url),
            proxy_url: env("AVATAR_CHAT_PROXY_URL")
                .or(fc.llm.proxy_url)
                .unwrap_or(llm_defaults.proxy_url),
            forward_history: parse_bool_env(&env, "AVATAR_FORWARD_HISTORY")?
                .or(fc.llm.forward_history)
                .unwrap_or(llm_defaults.forward_history),
        };

        let gate_defaults = GateConfig::default();
        let gate = GateConfig {
            enabled: parse_bool_env(&env, "AVATAR_GATE_ENABLED")?
                .or(fc.gate.enabled)
                .unwrap_or(gate_defaults.enabled),
            reference_images: env("AVATAR_REFERENCE_IMAGES")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .or(fc.gate.reference_images)
                .unwrap_or(gate_defaults.reference_images),
            frame_path: env("AVATAR_FRAME_PATH")
                .map(PathBuf::from)
                .or(fc.gate.frame_path)
                .unwrap_or(gate_defaults.frame_path),
        };

        let server = ServerConfig {
            port: match env("AVATAR_PORT").or_else(|| env("PORT")) {
                Some(raw) => Some(
                    raw.parse()
                        .map_err(|_| Error::Config(format!("invalid port: {raw}")))?,
                ),
                None => fc.server.port,
            }
            .unwrap_or(DEFAULT_PORT),
            rate_limit_per_minute: parse_env(&env, "AVATAR_RATE_LIMIT")?
                .or(fc.server.rate_limit_per_minute),
        };

        if gate.enabled && gate.reference_images.is_empty() {
            return Err(Error::Config(
                "gate enabled but no reference images configured".to_string(),
            ));
        }

        Ok(Self {
            avatar,
            service,
            llm,
            gate,
            server,
        })
    }
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for {key}: {raw}")))
        })
        .transpose()
}

fn parse_bool_env<F>(env: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!("invalid value for {key}: {raw}"))),
        })
        .transpose()
}
