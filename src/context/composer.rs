//! Response composition from retrieved context and conversation history

use std::sync::Arc;

use super::ConversationMemory;
use crate::llm::Generate;
use crate::prompt::PromptContext;
use crate::{Error, Result};

/// Renders prompts, calls the language model and records the turn
pub struct ResponseComposer {
    memory: Arc<ConversationMemory>,
}

impl ResponseComposer {
    /// Create a composer writing to `memory`
    #[must_use]
    pub const fn new(memory: Arc<ConversationMemory>) -> Self {
        Self { memory }
    }

    /// Prompt that [`Self::compose_response`] would send
    #[must_use]
    pub fn build_prompt(&self, query: &str, context_chunks: &[String]) -> PromptContext {
        PromptContext::new(self.memory.render_history(), context_chunks, query)
    }

    /// Answer `query`, grounded in `context_chunks` when any are given
    ///
    /// The trimmed answer is appended to memory. The model is called once;
    /// nothing is recorded when it fails.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if no model is loaded, or the model's error
    pub async fn compose_response(
        &self,
        generator: Option<&dyn Generate>,
        query: &str,
        context_chunks: &[String],
    ) -> Result<String> {
        let generator = generator.ok_or(Error::Unavailable("language model"))?;

        let prompt = self.build_prompt(query, context_chunks);
        tracing::debug!(
            chunks = context_chunks.len(),
            grounded = prompt.has_document_context(),
            "composing response"
        );

        let raw = generator.generate(&prompt.render()).await?;
        let answer = raw.trim().to_string();

        self.memory.append_turn(query, answer.clone());
        Ok(answer)
    }
}
