//! Handles to the model backends, each optional
//!
//! A missing backend is a normal state: the server still starts and every
//! caller checks for the handle before use.

use std::sync::Arc;

use serde::Serialize;

use crate::db::Embed;
use crate::llm::Generate;
use crate::voice::{Synthesize, Transcribe};

/// Loaded model backends
#[derive(Clone, Default)]
pub struct Capabilities {
    /// Speech recognition
    pub transcriber: Option<Arc<dyn Transcribe>>,
    /// Text embeddings
    pub embedder: Option<Arc<dyn Embed>>,
    /// Response generation
    pub generator: Option<Arc<dyn Generate>>,
    /// Speech synthesis
    pub synthesizer: Option<Arc<dyn Synthesize>>,
}

/// Which backends are loaded, as reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelsLoaded {
    pub asr: bool,
    pub embeddings: bool,
    pub llm: bool,
    pub tts: bool,
}

impl Capabilities {
    /// No backends loaded
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the speech recognizer
    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcribe>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Set the embedder
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embed>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the language model
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn Generate>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the speech synthesizer
    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesize>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Borrow the embedder
    #[must_use]
    pub fn embedder(&self) -> Option<&dyn Embed> {
        self.embedder.as_deref()
    }

    /// Borrow the language model
    #[must_use]
    pub fn generator(&self) -> Option<&dyn Generate> {
        self.generator.as_deref()
    }

    /// Load state of each backend
    #[must_use]
    pub const fn loaded(&self) -> ModelsLoaded {
        ModelsLoaded {
            asr: self.transcriber.is_some(),
            embeddings: self.embedder.is_some(),
            llm: self.generator.is_some(),
            tts: self.synthesizer.is_some(),
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("loaded", &self.loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LanguageModel;

    #[test]
    fn test_loaded_flags() {
        assert_eq!(
            Capabilities::none().loaded(),
            ModelsLoaded {
                asr: false,
                embeddings: false,
                llm: false,
                tts: false
            }
        );

        let llm = LanguageModel::ollama("http://localhost:11434".to_string(), "gemma3".to_string())
            .unwrap();
        let caps = Capabilities::none().with_generator(Arc::new(llm));
        assert!(caps.loaded().llm);
        assert!(caps.generator().is_some());
        assert!(caps.embedder().is_none());
    }
}
