//! TOML configuration file loading
//!
//! Supports `~/.config/avatar-gateway/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::LlmTransport;
use crate::avatar::{AvatarQuality, SttProvider, VoiceChatTransport, VoiceEmotion};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfigFile {
    /// Avatar appearance and voice
    #[serde(default)]
    pub avatar: AvatarFileConfig,

    /// Avatar service account
    #[serde(default)]
    pub service: ServiceFileConfig,

    /// Text generation
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Camera gate
    #[serde(default)]
    pub gate: GateFileConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Avatar session request overrides
#[derive(Debug, Default, Deserialize)]
pub struct AvatarFileConfig {
    pub name: Option<String>,
    pub knowledge_id: Option<String>,
    pub quality: Option<AvatarQuality>,
    pub language: Option<String>,
    pub voice_rate: Option<f32>,
    pub voice_emotion: Option<VoiceEmotion>,
    pub voice_model: Option<String>,
    pub transport: Option<VoiceChatTransport>,
    pub stt_provider: Option<SttProvider>,
}

/// Avatar service account configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServiceFileConfig {
    /// REST API base URL
    pub base_url: Option<String>,
    /// Account API key
    pub api_key: Option<String>,
    /// External token endpoint, used instead of minting tokens locally
    pub token_url: Option<String>,
}

/// Text generation configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// "direct" or "proxy"
    pub transport: Option<LlmTransport>,
    /// Model identifier (e.g. "gemini-1.5-flash-latest")
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Base URL of the chat proxy
    pub proxy_url: Option<String>,
    /// Forward prior turns as context
    pub forward_history: Option<bool>,
}

/// Camera gate configuration
#[derive(Debug, Default, Deserialize)]
pub struct GateFileConfig {
    pub enabled: Option<bool>,
    /// Reference images, compared in order
    pub reference_images: Option<Vec<PathBuf>>,
    /// File the camera capture process keeps overwriting with the latest frame
    pub frame_path: Option<PathBuf>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,
    /// Requests per minute allowed on `/api/*` (unset = unlimited)
    pub rate_limit_per_minute: Option<u32>,
}

/// Load the TOML config file from the standard path
///
/// Returns `GatewayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> GatewayConfigFile {
    config_file_path().map_or_else(GatewayConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults.
pub fn load_config_file_from(path: &Path) -> GatewayConfigFile {
    if !path.exists() {
        return GatewayConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GatewayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GatewayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/avatar-gateway/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("avatar-gateway").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[avatar]
name = "Wayne_20240711"
voice_emotion = "friendly"

[llm]
transport = "proxy"
forward_history = true

[gate]
reference_images = ["a.png", "b.png"]
"#
        )
        .unwrap();

        let config = load_config_file_from(file.path());
        assert_eq!(config.avatar.name.as_deref(), Some("Wayne_20240711"));
        assert_eq!(config.avatar.voice_emotion, Some(VoiceEmotion::Friendly));
        assert_eq!(config.llm.transport, Some(LlmTransport::Proxy));
        assert_eq!(config.llm.forward_history, Some(true));
        assert_eq!(config.gate.reference_images.map(|r| r.len()), Some(2));
        assert!(config.server.port.is_none());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();

        let config = load_config_file_from(file.path());
        assert!(config.avatar.name.is_none());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_file_from(Path::new("/nonexistent/avatar-gateway.toml"));
        assert!(config.llm.model.is_none());
    }
}
