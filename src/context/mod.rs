//! Conversation context for grounded answers
//!
//! Combines:
//! - Conversation history (every turn since the last reset)
//! - Retrieved document chunks

mod composer;
mod memory;

pub use composer::ResponseComposer;
pub use memory::{ConversationMemory, Turn};
