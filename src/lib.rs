//! Friday Gateway - voice and text assistant grounded in one document
//!
//! This library provides the core functionality for Friday:
//! - Document ingestion (PDF/text extraction, chunking, embedding, vector index)
//! - Grounded answers with a running conversation
//! - Hands-free wake word listening (capture, STT, text and embedding matching)
//! - HTTP and WebSocket API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Interfaces                      │
//! │   HTTP (/api/v1)  │  WS listen  │  WS heartbeat     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Assistant                       │
//! │  Document index  │  Conversation  │  Wake session   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Model backends (optional)              │
//! │   LLM  │  Embeddings  │  STT  │  TTS                │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod capabilities;
pub mod config;
pub mod context;
pub mod daemon;
pub mod db;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod media;
pub mod prompt;
pub mod voice;

pub use assistant::{Answer, Assistant, Status};
pub use capabilities::{Capabilities, ModelsLoaded};
pub use config::Config;
pub use context::{ConversationMemory, ResponseComposer};
pub use daemon::Daemon;
pub use db::{DbConn, DbPool, Embed, Embedder};
pub use error::{Error, Result};
pub use knowledge::{DocumentIndex, TextSplitter, cosine_similarity};
pub use llm::{Generate, LanguageModel};
