//! TOML configuration file loading
//!
//! Supports `~/.config/friday/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct FridayConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Model backends
    #[serde(default)]
    pub models: ModelsFileConfig,

    /// Speech recognition and synthesis
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Wake word listening
    #[serde(default)]
    pub wake_word: WakeWordFileConfig,

    /// Retrieval parameters
    #[serde(default)]
    pub rag: RagFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory served at `/`
    pub static_dir: Option<String>,

    /// Root of the index, uploads and generated audio
    pub data_dir: Option<String>,
}

/// Model backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelsFileConfig {
    /// "ollama" or "openai"
    pub provider: Option<String>,

    pub ollama_url: Option<String>,

    /// Generation model (e.g. "gemma3:4b-it-qat")
    pub llm_model: Option<String>,

    /// Embedding model (e.g. "nomic-embed-text")
    pub embedding_model: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable microphone, STT and TTS
    pub enabled: Option<bool>,

    /// Whisper-compatible transcription server
    pub stt_url: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// Wake word configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeWordFileConfig {
    pub phrase: Option<String>,
    pub similarity_threshold: Option<f32>,
    pub capture_seconds: Option<u64>,
    pub sample_rate: Option<u32>,
    pub fallback_device_index: Option<usize>,
}

/// Retrieval configuration
#[derive(Debug, Default, Deserialize)]
pub struct RagFileConfig {
    pub top_k: Option<usize>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `FridayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> FridayConfigFile {
    config_file_path().map_or_else(FridayConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> FridayConfigFile {
    if !path.exists() {
        return FridayConfigFile::default();
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
                FridayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            FridayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/friday/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("friday").join("config.toml"))
}
