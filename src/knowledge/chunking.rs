//! Recursive character text splitting
//!
//! Text is split on the highest-priority separator it contains. Pieces that
//! fit are merged back into chunks of at most `chunk_size` characters with up
//! to `chunk_overlap` characters carried over between neighbours. Pieces that
//! are still too large are split again with the remaining separators, down to
//! single characters.
//!
//! Separators are kept at the start of the piece that follows them, so
//! "one. two" splits on "." into "one" and ". two".

use std::collections::VecDeque;

use serde::Serialize;

use crate::{Error, Result};

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between neighbouring chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Separators in priority order; the empty separator splits into characters
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ".", " ", ""];

/// A piece of an indexed document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentChunk {
    /// Position of the chunk within its document, from zero
    pub id: usize,
    /// Name of the document the chunk came from
    pub source: String,
    /// Chunk text, whitespace-trimmed
    pub text: String,
}

/// Splits text into overlapping chunks
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl TextSplitter {
    /// Create a splitter with the default separators
    ///
    /// # Errors
    ///
    /// Returns error if the size is zero or the overlap is not smaller than it
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be non-zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    /// Maximum chunk length in characters
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters carried over between neighbouring chunks
    #[must_use]
    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into trimmed, non-empty chunks
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    /// Split a document and tag each chunk with its source and position
    #[must_use]
    pub fn chunk_document(&self, text: &str, source: &str) -> Vec<DocumentChunk> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(id, text)| DocumentChunk {
                id,
                source: source.to_string(),
                text,
            })
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map_or("", String::as_str);
        let mut remaining: &[String] = &[];

        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    /// Greedily join pieces into chunks, keeping a tail of each as overlap
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    tracing::warn!(
                        size = total,
                        limit = self.chunk_size,
                        "created a chunk longer than the limit"
                    );
                }

                push_trimmed(&mut chunks, &window);

                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                }
            }

            window.push_back(piece);
            total += len;
        }

        push_trimmed(&mut chunks, &window);
        chunks
    }
}

fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, prefixing every piece after the first with it
///
/// An empty separator splits into single characters. Empty pieces are dropped.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces = Vec::new();

    if let Some(first) = parts.next() {
        pieces.push(first.to_string());
    }
    pieces.extend(parts.map(|part| format!("{separator}{part}")));

    pieces.retain(|p| !p.is_empty());
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(count: usize) -> String {
        (0..count)
            .map(|i| format!("Sentence number {i} is here."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = TextSplitter::default();
        assert_eq!(splitter.split_text("Hello world"), vec!["Hello world"]);
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        let splitter = TextSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text(" \n\n \n").is_empty());
    }

    #[test]
    fn test_separator_kept_at_start_of_next_piece() {
        let splitter = TextSplitter::new(12, 0).unwrap();
        assert_eq!(
            splitter.split_text("aaaa. bbbb. cccc"),
            vec!["aaaa. bbbb", ". cccc"]
        );
    }

    #[test]
    fn test_falls_back_to_characters() {
        let splitter = TextSplitter::new(5, 0).unwrap();
        assert_eq!(splitter.split_text("abcdefghij"), vec!["abcde", "fghij"]);
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let splitter = TextSplitter::default();
        let text = format!("{}\n\n{}\n{}", sentences(40), sentences(25), "x".repeat(1200));
        let chunks = splitter.split_text(&text);

        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= DEFAULT_CHUNK_SIZE, "{} chars", chunk.len());
            assert_eq!(chunk.trim(), chunk);
        }
    }

    #[test]
    fn test_neighbouring_chunks_overlap() {
        let splitter = TextSplitter::default();
        let chunks = splitter.split_text(&sentences(60));

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let head = &pair[1][..20];
            assert!(pair[0].contains(head), "{head:?} not carried over");
        }
    }

    #[test]
    fn test_chunk_document_metadata() {
        let splitter = TextSplitter::new(12, 0).unwrap();
        let chunks = splitter.chunk_document("aaaa. bbbb. cccc", "notes.txt");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, 0);
        assert_eq!(chunks[1].id, 1);
        assert!(chunks.iter().all(|c| c.source == "notes.txt"));
    }

    #[test]
    fn test_invalid_settings() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }
}
