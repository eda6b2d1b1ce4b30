//! Daemon - the main Friday service
//!
//! Loads the model backends that are reachable, restores the last indexed
//! document and serves the HTTP API until interrupted.

use std::sync::Arc;

use crate::api::ApiServerBuilder;
use crate::assistant::Assistant;
use crate::capabilities::Capabilities;
use crate::config::{Config, ModelProvider};
use crate::db::{Embed, Embedder};
use crate::knowledge::{DocumentIndex, TextSplitter};
use crate::llm::LanguageModel;
use crate::media::{AudioStore, MAX_AUDIO_AGE};
use crate::voice::{
    Microphone, SessionConfig, SpeechToText, TextToSpeech, WakeWordProfile,
};
use crate::Result;

/// Deepgram model used when it is the only STT key available
const DEEPGRAM_MODEL: &str = "nova-2";

/// The Friday daemon
pub struct Daemon {
    config: Config,
    assistant: Arc<Assistant>,
    audio: AudioStore,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the chunking parameters are invalid or the audio directory cannot be created
    pub fn new(config: Config) -> Result<Self> {
        let capabilities = build_capabilities(&config);
        let assistant = Arc::new(build_assistant(&config, capabilities)?);
        let audio = AudioStore::new(config.temp_audio_dir())?;

        Ok(Self {
            config,
            assistant,
            audio,
        })
    }

    /// The assistant served by this daemon
    #[must_use]
    pub const fn assistant(&self) -> &Arc<Assistant> {
        &self.assistant
    }

    /// Run the daemon until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails
    pub async fn run(self) -> Result<()> {
        let loaded = self.assistant.capabilities().loaded();
        tracing::info!(
            asr = loaded.asr,
            embeddings = loaded.embeddings,
            llm = loaded.llm,
            tts = loaded.tts,
            "models loaded"
        );

        if let Some(name) = self.assistant.restore().await {
            tracing::info!(document = %name, "restored document index");
        }

        self.sweep_audio();

        let profile = wake_word_profile(&self.config, self.assistant.capabilities().embedder()).await;
        tracing::info!(phrase = %profile.phrase(), "wake word configured");

        let microphone = Microphone::new(self.config.wake_word.fallback_device_index);

        let server = ApiServerBuilder::new(
            Arc::clone(&self.assistant),
            Arc::new(profile),
            Arc::new(microphone),
            self.audio.clone(),
            self.config.uploads_dir(),
            self.config.server.port,
        )
        .static_dir(self.config.server.static_dir.clone())
        .session_config(session_config(&self.config))
        .build();

        let result = server.run_until(shutdown_signal()).await;

        self.sweep_audio();
        tracing::info!("daemon stopped");
        result
    }

    fn sweep_audio(&self) {
        if let Err(e) = self.audio.clean_older_than(MAX_AUDIO_AGE) {
            tracing::warn!(error = %e, "failed to clean temp audio");
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown requested");
    }
}

/// Construct every backend the configuration allows
///
/// A backend that cannot be constructed is logged and left out.
#[must_use]
pub fn build_capabilities(config: &Config) -> Capabilities {
    let mut capabilities = Capabilities::none();
    let models = &config.models;
    let openai_key = config.api_keys.openai.clone();

    let embedder = match models.provider {
        ModelProvider::Ollama => {
            Embedder::ollama(models.ollama_url.clone(), models.embedding_model.clone())
        }
        ModelProvider::OpenAI => Embedder::openai(
            openai_key.clone().unwrap_or_default(),
            models.embedding_model.clone(),
        ),
    };
    match embedder {
        Ok(embedder) => capabilities = capabilities.with_embedder(Arc::new(embedder)),
        Err(e) => tracing::warn!(error = %e, "embedding model unavailable"),
    }

    let generator = match models.provider {
        ModelProvider::Ollama => {
            LanguageModel::ollama(models.ollama_url.clone(), models.llm_model.clone())
        }
        ModelProvider::OpenAI => LanguageModel::openai(
            openai_key.clone().unwrap_or_default(),
            models.llm_model.clone(),
        ),
    };
    match generator {
        Ok(generator) => capabilities = capabilities.with_generator(Arc::new(generator)),
        Err(e) => tracing::warn!(error = %e, "language model unavailable"),
    }

    if !config.voice.enabled {
        tracing::info!("voice disabled");
        return capabilities;
    }

    let voice = &config.voice;
    let transcriber = if let Some(url) = &voice.stt_url {
        Some(SpeechToText::new_whisper_compatible(
            url.clone(),
            openai_key.clone(),
            voice.stt_model.clone(),
        ))
    } else if let Some(key) = &openai_key {
        Some(SpeechToText::new_whisper(key.clone(), voice.stt_model.clone()))
    } else {
        config
            .api_keys
            .deepgram
            .as_ref()
            .map(|key| SpeechToText::new_deepgram(key.clone(), DEEPGRAM_MODEL.to_string()))
    };
    match transcriber {
        Some(Ok(stt)) => capabilities = capabilities.with_transcriber(Arc::new(stt)),
        Some(Err(e)) => tracing::warn!(error = %e, "speech recognition unavailable"),
        None => tracing::info!("no STT configured (set FRIDAY_STT_URL or OPENAI_API_KEY)"),
    }

    if let Some(key) = openai_key {
        match TextToSpeech::new_openai_with_model(
            key,
            voice.tts_voice.clone(),
            voice.tts_speed,
            voice.tts_model.clone(),
        ) {
            Ok(tts) => capabilities = capabilities.with_synthesizer(Arc::new(tts)),
            Err(e) => tracing::warn!(error = %e, "speech synthesis unavailable"),
        }
    }

    capabilities
}

/// Build the assistant over the persisted index location
///
/// # Errors
///
/// Returns error if the chunking parameters are invalid
pub fn build_assistant(config: &Config, capabilities: Capabilities) -> Result<Assistant> {
    let splitter = TextSplitter::new(config.rag.chunk_size, config.rag.chunk_overlap)?;
    let index = DocumentIndex::new(splitter, Some(config.index_path()));

    Ok(Assistant::new(capabilities, index).with_top_k(config.rag.top_k))
}

/// Wake word profile with the phrase embedding precomputed when possible
pub async fn wake_word_profile(config: &Config, embedder: Option<&dyn Embed>) -> WakeWordProfile {
    let profile = WakeWordProfile::new(config.wake_word.phrase.clone())
        .with_similarity_threshold(config.wake_word.similarity_threshold);

    let Some(embedder) = embedder else {
        return profile;
    };

    match embedder.embed(profile.phrase()).await {
        Ok(embedding) => profile.with_embedding(embedding),
        Err(e) => {
            tracing::warn!(error = %e, "failed to embed wake phrase, sessions will retry");
            profile
        }
    }
}

/// Listen session timing from the wake word settings
#[must_use]
pub fn session_config(config: &Config) -> SessionConfig {
    SessionConfig {
        frame_duration: config.wake_word.frame_duration(),
        sample_rate: config.wake_word.sample_rate,
        ..SessionConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::FridayConfigFile;

    fn config_with(pairs: &[(&str, &str)]) -> Config {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::resolve(FridayConfigFile::default(), move |key| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn test_ollama_backends_without_keys() {
        let loaded = build_capabilities(&config_with(&[])).loaded();
        assert!(loaded.embeddings);
        assert!(loaded.llm);
        assert!(!loaded.asr);
        assert!(!loaded.tts);
    }

    #[test]
    fn test_openai_without_key_loads_nothing() {
        let loaded = build_capabilities(&config_with(&[("FRIDAY_PROVIDER", "openai")])).loaded();
        assert!(!loaded.embeddings);
        assert!(!loaded.llm);
    }

    #[test]
    fn test_voice_backends_with_key() {
        let loaded = build_capabilities(&config_with(&[("OPENAI_API_KEY", "sk-test")])).loaded();
        assert!(loaded.asr);
        assert!(loaded.tts);

        let mut config = config_with(&[("OPENAI_API_KEY", "sk-test")]);
        config.voice.enabled = false;
        let loaded = build_capabilities(&config).loaded();
        assert!(!loaded.asr);
        assert!(!loaded.tts);
    }

    #[test]
    fn test_session_config_follows_wake_word_settings() {
        let config = config_with(&[]);
        let session = session_config(&config);
        assert_eq!(session.frame_duration, std::time::Duration::from_secs(4));
        assert_eq!(session.sample_rate, 16000);
        assert_eq!(session.control_poll, SessionConfig::default().control_poll);
    }

    #[tokio::test]
    async fn test_profile_without_embedder() {
        let profile = wake_word_profile(&config_with(&[("FRIDAY_WAKE_WORD", "Hey Jarvis")]), None).await;
        assert_eq!(profile.phrase(), "Hey Jarvis");
        assert!(profile.embedding().is_none());
    }
}
