//! Conversation history shared by every request

use std::fmt::Write;
use std::sync::{Mutex, MutexGuard};

/// One question and the answer given to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Ordered, unbounded list of turns
///
/// The lock is only held for the duration of a single call.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    turns: Mutex<Vec<Turn>>,
}

impl ConversationMemory {
    /// Create an empty memory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a turn at the end of the history
    pub fn append_turn(&self, question: impl Into<String>, answer: impl Into<String>) {
        self.lock().push(Turn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// Render as `Human: ...\nAI: ...\n` per turn, oldest first
    #[must_use]
    pub fn render_history(&self) -> String {
        self.lock().iter().fold(String::new(), |mut out, turn| {
            let _ = writeln!(out, "Human: {}", turn.question);
            let _ = writeln!(out, "AI: {}", turn.answer);
            out
        })
    }

    /// Forget every turn
    pub fn clear(&self) {
        let mut turns = self.lock();
        if !turns.is_empty() {
            tracing::debug!(turns = turns.len(), "conversation memory cleared");
        }
        turns.clear();
    }

    /// Number of recorded turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no turns are recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the recorded turns
    #[must_use]
    pub fn turns(&self) -> Vec<Turn> {
        self.lock().clone()
    }

    // A panic while holding the lock cannot leave a half-written turn, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<Turn>> {
        self.turns
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_in_order() {
        let memory = ConversationMemory::new();
        memory.append_turn("What is the budget?", "Ten thousand dollars.");
        memory.append_turn("And the deadline?", "March.");

        assert_eq!(
            memory.render_history(),
            "Human: What is the budget?\nAI: Ten thousand dollars.\nHuman: And the deadline?\nAI: March.\n"
        );
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_empty_renders_empty() {
        let memory = ConversationMemory::new();
        assert_eq!(memory.render_history(), "");
        assert!(memory.is_empty());
    }

    #[test]
    fn test_clear() {
        let memory = ConversationMemory::new();
        memory.append_turn("hi", "hello");
        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.render_history(), "");
    }

    #[test]
    fn test_no_truncation() {
        let memory = ConversationMemory::new();
        for i in 0..500 {
            memory.append_turn(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(memory.len(), 500);
        assert_eq!(memory.turns()[0].question, "q0");
    }
}
