//! The assistant: one document index, one conversation, optional models

use std::sync::Arc;

use serde::Serialize;

use crate::capabilities::{Capabilities, ModelsLoaded};
use crate::context::{ConversationMemory, ResponseComposer};
use crate::knowledge::{DocumentIndex, IndexedDocument};
use crate::Result;

/// Default number of chunks retrieved per question
pub const DEFAULT_TOP_K: usize = 3;

/// A grounded answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub response_text: String,
    /// Chunks the answer was grounded in; empty when no document is indexed
    pub context_used: Vec<String>,
}

/// Health and load state reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub status: &'static str,
    pub models_loaded: ModelsLoaded,
    pub indexed_document_name: Option<String>,
}

/// Owns the index, the conversation and the model handles
pub struct Assistant {
    capabilities: Capabilities,
    index: DocumentIndex,
    memory: Arc<ConversationMemory>,
    composer: ResponseComposer,
    top_k: usize,
}

impl Assistant {
    /// Create an assistant over `index`
    #[must_use]
    pub fn new(capabilities: Capabilities, index: DocumentIndex) -> Self {
        let memory = Arc::new(ConversationMemory::new());

        Self {
            capabilities,
            index,
            composer: ResponseComposer::new(Arc::clone(&memory)),
            memory,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Override the number of chunks retrieved per question
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Model handles
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The document index
    #[must_use]
    pub const fn index(&self) -> &DocumentIndex {
        &self.index
    }

    /// The shared conversation
    #[must_use]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Reload a persisted index from a previous run
    pub async fn restore(&self) -> Option<String> {
        self.index.restore().await
    }

    /// Index a document, replacing any previous one and resetting the conversation
    ///
    /// # Errors
    ///
    /// Returns error if the embedder is missing or indexing fails
    pub async fn upload_document(&self, bytes: Vec<u8>, name: &str) -> Result<IndexedDocument> {
        self.index
            .index_document(bytes, name, self.capabilities.embedder(), &self.memory)
            .await
    }

    /// Answer a question from the indexed document and the conversation so far
    ///
    /// The index stays read-locked for the whole turn, so an upload or reset
    /// waits until the answer has been recorded.
    ///
    /// # Errors
    ///
    /// Returns error if no language model is loaded or generation fails
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let reader = self.index.read().await;

        let context_used = reader
            .query(query, self.top_k, self.capabilities.embedder())
            .await;

        let response_text = self
            .composer
            .compose_response(self.capabilities.generator(), query, &context_used)
            .await?;

        drop(reader);

        tracing::info!(
            chunks = context_used.len(),
            answer_chars = response_text.len(),
            "answered question"
        );

        Ok(Answer {
            response_text,
            context_used,
        })
    }

    /// Drop the index and forget the conversation; returns whether an index existed
    pub async fn clear_state(&self) -> bool {
        self.index.reset(&self.memory).await
    }

    /// Load state of models and the indexed document
    pub async fn status(&self) -> Status {
        Status {
            status: "healthy",
            models_loaded: self.capabilities.loaded(),
            indexed_document_name: self.index.document_name().await,
        }
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("capabilities", &self.capabilities)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}
