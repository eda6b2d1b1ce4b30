//! Prompt templates for grounded and general conversation

use std::fmt::Write;

const DOCUMENT_INSTRUCTIONS: &str = "You are a friendly talkative AI assistant named Friday. \
Use the following context to answer the user question. Keep your answer short, concise and helpful.
If you cannot find the answer in the context, say so. If the question refers to previous questions or answers,
use the chat history to understand the context.";

const GENERAL_INSTRUCTIONS: &str = "You are a friendly talkative AI assistant named Friday. \
No document has been uploaded yet, so just have a friendly conversation.
Keep your answer short, concise and helpful. If the user asks about document-specific information, \
politely inform them that they need to upload a document first. If the question refers to previous \
questions or answers, use the chat history to understand the context.";

/// Inputs for one rendered prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    /// Rendered conversation history
    pub history: String,
    /// Retrieved chunks joined by newlines; empty when nothing was retrieved
    pub context: String,
    /// The user's question
    pub question: String,
}

impl PromptContext {
    /// Build from a history string, retrieved chunks and the question
    #[must_use]
    pub fn new(history: String, chunks: &[String], question: &str) -> Self {
        Self {
            history,
            context: chunks.join("\n"),
            question: question.to_string(),
        }
    }

    /// Whether document context is available
    #[must_use]
    pub fn has_document_context(&self) -> bool {
        !self.context.is_empty()
    }

    /// Render the document template when context exists, the general one otherwise
    #[must_use]
    pub fn render(&self) -> String {
        let mut prompt = String::new();

        if self.has_document_context() {
            let _ = writeln!(prompt, "{DOCUMENT_INSTRUCTIONS}\n");
            let _ = writeln!(prompt, "Chat history:\n{}\n", self.history);
            let _ = writeln!(prompt, "Context:\n{}\n", self.context);
        } else {
            let _ = writeln!(prompt, "{GENERAL_INSTRUCTIONS}\n");
            let _ = writeln!(prompt, "Chat history:\n{}\n", self.history);
        }

        let _ = writeln!(prompt, "Question: {}\n", self.question);
        prompt.push_str("Answer:");
        prompt
    }
}
