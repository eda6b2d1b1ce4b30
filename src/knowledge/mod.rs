//! Document knowledge for grounded answers
//!
//! - **extract**: Pull text out of uploaded PDFs and plain-text files
//! - **chunking**: Split text into overlapping chunks
//! - **index**: Build, persist, query and clear the single active index

pub mod chunking;
pub mod extract;
mod index;

pub use chunking::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DocumentChunk, TextSplitter,
};
pub use extract::DocumentKind;
pub use index::{DocumentIndex, IndexReader, IndexedDocument};

/// Cosine similarity between two vectors
///
/// Returns 0.0 for empty, mismatched or zero-length vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}
