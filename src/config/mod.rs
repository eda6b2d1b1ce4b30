//! Configuration management for Friday
//!
//! Every value resolves with precedence env > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};
use file::FridayConfigFile;

/// Default API server port
pub const DEFAULT_PORT: u16 = 5000;

/// Default generation model served by Ollama
pub const DEFAULT_LLM_MODEL: &str = "gemma3:4b-it-qat";

/// Default embedding model served by Ollama
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Default wake phrase
pub const DEFAULT_WAKE_WORD: &str = "Hey Friday";

/// File name of the persisted vector store inside `<data>/index/`
const INDEX_FILE: &str = "friday.db";

/// Friday gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Model backends
    pub models: ModelsConfig,

    /// Speech recognition and synthesis
    pub voice: VoiceConfig,

    /// Wake word listening
    pub wake_word: WakeWordConfig,

    /// Retrieval parameters
    pub rag: RagConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory served at `/`, if any
    pub static_dir: Option<PathBuf>,
    /// Root of the index, uploads and generated audio
    pub data_dir: PathBuf,
}

/// Which service hosts the LLM and embedding models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    Ollama,
    OpenAI,
}

impl std::str::FromStr for ModelProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            other => Err(Error::Config(format!(
                "unknown model provider '{other}' (expected 'ollama' or 'openai')"
            ))),
        }
    }
}

/// Model backend configuration
#[derive(Debug, Clone)]
pub struct ModelsConfig {
    pub provider: ModelProvider,
    pub ollama_url: String,
    pub llm_model: String,
    pub embedding_model: String,
}

/// Voice configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Microphone, STT and TTS enabled
    pub enabled: bool,

    /// Whisper-compatible STT server; `None` uses the hosted API
    pub stt_url: Option<String>,

    /// STT model
    pub stt_model: String,

    /// TTS model
    pub tts_model: String,

    /// TTS voice
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f32,
}

/// Wake word configuration
#[derive(Debug, Clone)]
pub struct WakeWordConfig {
    pub phrase: String,
    pub similarity_threshold: f32,
    pub capture_seconds: u64,
    pub sample_rate: u32,
    pub fallback_device_index: usize,
}

impl WakeWordConfig {
    /// Length of one captured frame
    #[must_use]
    pub const fn frame_duration(&self) -> Duration {
        Duration::from_secs(self.capture_seconds)
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Copy)]
pub struct RagConfig {
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// API keys
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ApiKeys")
            .field("openai", &redact(&self.openai))
            .field("deepgram", &redact(&self.deepgram))
            .finish()
    }
}

impl Config {
    /// Load configuration from environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid or the data directories cannot be created
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration, optionally turning voice off
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid or the data directories cannot be created
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file();
        let mut config = Self::resolve(fc, |key| std::env::var(key).ok())?;

        if disable_voice {
            config.voice.enabled = false;
        }

        config.prepare_dirs()?;
        Ok(config)
    }

    /// Resolve configuration from a file overlay and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn resolve<F>(fc: FridayConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let port = env("FRIDAY_PORT")
            .or_else(|| env("PORT"))
            .and_then(|p| p.parse().ok())
            .or(fc.server.port)
            .unwrap_or(DEFAULT_PORT);

        let data_dir = env("FRIDAY_DATA_DIR")
            .or(fc.server.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        let server = ServerConfig {
            port,
            static_dir: env("FRIDAY_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            data_dir,
        };

        let provider = env("FRIDAY_PROVIDER")
            .or(fc.models.provider)
            .map_or(Ok(ModelProvider::Ollama), |p| p.parse())?;

        let models = ModelsConfig {
            provider,
            ollama_url: env("OLLAMA_URL")
                .or(fc.models.ollama_url)
                .unwrap_or_else(|| crate::db::OLLAMA_BASE_URL.to_string()),
            llm_model: env("FRIDAY_LLM_MODEL")
                .or(fc.models.llm_model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            embedding_model: env("FRIDAY_EMBEDDING_MODEL")
                .or(fc.models.embedding_model)
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
        };

        let voice = VoiceConfig {
            enabled: env("FRIDAY_VOICE_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.voice.enabled)
                .unwrap_or(true),
            stt_url: env("FRIDAY_STT_URL").or(fc.voice.stt_url),
            stt_model: env("FRIDAY_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("FRIDAY_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: fc.voice.tts_voice.unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
        };

        let wake_word = WakeWordConfig {
            phrase: env("FRIDAY_WAKE_WORD")
                .or(fc.wake_word.phrase)
                .unwrap_or_else(|| DEFAULT_WAKE_WORD.to_string()),
            similarity_threshold: fc
                .wake_word
                .similarity_threshold
                .unwrap_or(crate::voice::DEFAULT_SIMILARITY_THRESHOLD),
            capture_seconds: fc.wake_word.capture_seconds.unwrap_or(4),
            sample_rate: fc
                .wake_word
                .sample_rate
                .unwrap_or(crate::voice::SAMPLE_RATE),
            fallback_device_index: fc.wake_word.fallback_device_index.unwrap_or(0),
        };

        if wake_word.capture_seconds == 0 {
            return Err(Error::Config("wake_word.capture_seconds must be positive".to_string()));
        }
        if wake_word.sample_rate == 0 {
            return Err(Error::Config("wake_word.sample_rate must be positive".to_string()));
        }

        let rag = RagConfig {
            top_k: fc.rag.top_k.unwrap_or(crate::assistant::DEFAULT_TOP_K),
            chunk_size: fc
                .rag
                .chunk_size
                .unwrap_or(crate::knowledge::DEFAULT_CHUNK_SIZE),
            chunk_overlap: fc
                .rag
                .chunk_overlap
                .unwrap_or(crate::knowledge::DEFAULT_CHUNK_OVERLAP),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        Ok(Self {
            server,
            models,
            voice,
            wake_word,
            rag,
            api_keys,
        })
    }

    /// Create the index, uploads and temp audio directories
    ///
    /// # Errors
    ///
    /// Returns error if a directory cannot be created
    pub fn prepare_dirs(&self) -> Result<()> {
        for dir in [self.index_dir(), self.uploads_dir(), self.temp_audio_dir()] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Directory of the persisted vector store
    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.server.data_dir.join("index")
    }

    /// Path of the persisted vector store
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.index_dir().join(INDEX_FILE)
    }

    /// Directory of uploaded documents
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.server.data_dir.join("uploads")
    }

    /// Directory of generated speech
    #[must_use]
    pub fn temp_audio_dir(&self) -> PathBuf {
        self.server.data_dir.join("temp_audio")
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/friday"),
        |d| d.data_dir().join("friday"),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(FridayConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.models.provider, ModelProvider::Ollama);
        assert_eq!(config.models.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.models.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.wake_word.phrase, "Hey Friday");
        assert!((config.wake_word.similarity_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.wake_word.frame_duration(), Duration::from_secs(4));
        assert_eq!(config.wake_word.sample_rate, 16000);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 100);
        assert!(config.voice.enabled);
        assert!(config.api_keys.openai.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: FridayConfigFile = toml::from_str(
            r#"
            [server]
            port = 7000

            [models]
            llm_model = "llama3"
            "#,
        )
        .unwrap();

        let config = Config::resolve(
            fc,
            env_from(&[("FRIDAY_PORT", "8123"), ("FRIDAY_WAKE_WORD", "Hey Jarvis")]),
        )
        .unwrap();

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.models.llm_model, "llama3");
        assert_eq!(config.wake_word.phrase, "Hey Jarvis");
    }

    #[test]
    fn test_port_fallback_env() {
        let config =
            Config::resolve(FridayConfigFile::default(), env_from(&[("PORT", "9001")])).unwrap();
        assert_eq!(config.server.port, 9001);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = Config::resolve(
            FridayConfigFile::default(),
            env_from(&[("FRIDAY_PROVIDER", "mystery")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_data_layout_created() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let config = Config::resolve(
            FridayConfigFile::default(),
            env_from(&[("FRIDAY_DATA_DIR", data.to_str().unwrap())]),
        )
        .unwrap();

        config.prepare_dirs().unwrap();
        assert!(data.join("index").is_dir());
        assert!(data.join("uploads").is_dir());
        assert!(data.join("temp_audio").is_dir());
        assert_eq!(config.index_path(), data.join("index").join("friday.db"));
    }
}
