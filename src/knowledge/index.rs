//! Lifecycle of the single active document index
//!
//! At most one document is indexed at a time. Uploading replaces it and
//! clearing removes it; both take the write lock, so concurrent uploads run
//! one after another and readers never see a half-built index. A failed
//! upload leaves no index behind.

use std::path::{Path, PathBuf};

use tokio::sync::{RwLock, RwLockReadGuard};

use super::chunking::{DocumentChunk, TextSplitter};
use super::extract;
use crate::context::ConversationMemory;
use crate::db::{Embed, VectorStore};
use crate::{Error, Result};

/// Chunks sent to the embedding backend per request
const EMBED_BATCH: usize = 64;

/// Summary of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    /// Stored document name
    pub name: String,
    /// Number of chunks indexed
    pub chunks: usize,
}

#[derive(Debug)]
struct ActiveIndex {
    name: String,
    store: VectorStore,
}

/// The process-wide document index
#[derive(Debug)]
pub struct DocumentIndex {
    active: RwLock<Option<ActiveIndex>>,
    splitter: TextSplitter,
    /// Where the store is persisted; `None` keeps it in memory
    path: Option<PathBuf>,
}

impl DocumentIndex {
    /// Create an empty index persisted at `path`
    #[must_use]
    pub fn new(splitter: TextSplitter, path: Option<PathBuf>) -> Self {
        Self {
            active: RwLock::new(None),
            splitter,
            path,
        }
    }

    /// Create an empty in-memory index
    #[must_use]
    pub fn in_memory(splitter: TextSplitter) -> Self {
        Self::new(splitter, None)
    }

    /// Reload the persisted store, if any
    ///
    /// A store that cannot be opened is deleted so the next upload starts
    /// clean. Returns the restored document name.
    pub async fn restore(&self) -> Option<String> {
        let path = self.path.as_deref()?;
        let mut active = self.active.write().await;

        let store = match VectorStore::load(path) {
            Ok(store) => store,
            Err(Error::NotFound(_)) => return None,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "discarding unreadable index");
                let _ = VectorStore::remove_file(path);
                return None;
            }
        };

        let name = match store.document_name() {
            Ok(Some(name)) => name,
            Ok(None) | Err(_) => {
                tracing::warn!(path = %path.display(), "persisted index has no document name");
                drop(store);
                let _ = VectorStore::remove_file(path);
                return None;
            }
        };

        tracing::info!(document = %name, "restored persisted index");
        *active = Some(ActiveIndex {
            name: name.clone(),
            store,
        });
        Some(name)
    }

    /// Replace the active index with a new document
    ///
    /// Runs teardown, extraction, chunking, embedding, build, persist and
    /// reload under the write lock, then records the name and clears
    /// `memory`. On any failure no index remains.
    ///
    /// # Errors
    ///
    /// Returns error if the embedder is missing or any step fails
    pub async fn index_document(
        &self,
        bytes: Vec<u8>,
        name: &str,
        embedder: Option<&dyn Embed>,
        memory: &ConversationMemory,
    ) -> Result<IndexedDocument> {
        let mut active = self.active.write().await;

        if let Some(previous) = active.take() {
            tracing::debug!(document = %previous.name, "dropping previous index");
        }
        if let Some(path) = &self.path {
            VectorStore::remove_file(path)?;
        }

        let embedder = embedder.ok_or(Error::Unavailable("embedding model"))?;

        let splitter = self.splitter.clone();
        let source = name.to_string();
        let chunks = tokio::task::spawn_blocking(move || {
            let text = extract::extract_text(&bytes, &source)?;
            Ok::<_, Error>(splitter.chunk_document(&text, &source))
        })
        .await
        .map_err(|e| Error::Document(format!("extraction task failed: {e}")))??;

        if chunks.is_empty() {
            return Err(Error::Document(format!("no text chunks produced from {name}")));
        }

        let embeddings = embed_chunks(embedder, &chunks).await?;
        let store = self.build_store(&chunks, &embeddings, name)?;

        tracing::info!(chunks = chunks.len(), document = %name, "document indexed");

        *active = Some(ActiveIndex {
            name: name.to_string(),
            store,
        });
        memory.clear();

        Ok(IndexedDocument {
            name: name.to_string(),
            chunks: chunks.len(),
        })
    }

    fn build_store(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
        name: &str,
    ) -> Result<VectorStore> {
        let Some(path) = &self.path else {
            let dimension = embeddings.first().map_or(0, Vec::len);
            let store = VectorStore::create_memory(dimension)?;
            store.insert(chunks, embeddings)?;
            store.set_document_name(name)?;
            return Ok(store);
        };

        let staging = staging_path(path);
        if let Err(e) = build_file(&staging, path, chunks, embeddings, name) {
            let _ = VectorStore::remove_file(&staging);
            return Err(e);
        }

        VectorStore::load(path)
    }

    /// Take the read lock for a multi-step read
    pub async fn read(&self) -> IndexReader<'_> {
        IndexReader {
            guard: self.active.read().await,
        }
    }

    /// Texts of the `top_k` chunks closest to `query`
    ///
    /// Empty when no document is indexed, the embedder is missing or the
    /// search fails.
    pub async fn query_index(
        &self,
        query: &str,
        top_k: usize,
        embedder: Option<&dyn Embed>,
    ) -> Vec<String> {
        self.read().await.query(query, top_k, embedder).await
    }

    /// Remove the active index and its file; returns whether one existed
    pub async fn clear_index(&self) -> bool {
        let mut active = self.active.write().await;
        self.teardown(&mut active)
    }

    /// Clear the index and `memory` together, so no turn sees one without the other
    pub async fn reset(&self, memory: &ConversationMemory) -> bool {
        let mut active = self.active.write().await;
        let existed = self.teardown(&mut active);
        memory.clear();
        existed
    }

    fn teardown(&self, active: &mut Option<ActiveIndex>) -> bool {
        let existed = active.take().is_some();

        if let Some(path) = &self.path {
            if let Err(e) = VectorStore::remove_file(path) {
                tracing::warn!(error = %e, "failed to delete persisted index");
            }
        }

        if existed {
            tracing::info!("document index cleared");
        }
        existed
    }

    /// Name of the indexed document
    pub async fn document_name(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|a| a.name.clone())
    }

    /// Every chunk of the indexed document
    pub async fn chunks(&self) -> Vec<DocumentChunk> {
        self.active
            .read()
            .await
            .as_ref()
            .and_then(|a| a.store.chunks().ok())
            .unwrap_or_default()
    }
}

/// Read access to the index held for the lifetime of the value
pub struct IndexReader<'a> {
    guard: RwLockReadGuard<'a, Option<ActiveIndex>>,
}

impl IndexReader<'_> {
    /// Name of the indexed document
    #[must_use]
    pub fn document_name(&self) -> Option<&str> {
        self.guard.as_ref().map(|a| a.name.as_str())
    }

    /// Texts of the `top_k` chunks closest to `query`
    pub async fn query(
        &self,
        query: &str,
        top_k: usize,
        embedder: Option<&dyn Embed>,
    ) -> Vec<String> {
        let (Some(active), Some(embedder)) = (self.guard.as_ref(), embedder) else {
            return Vec::new();
        };

        let embedding = match embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed");
                return Vec::new();
            }
        };

        match active.store.search(&embedding, top_k) {
            Ok(hits) => {
                tracing::debug!(hits = hits.len(), document = %active.name, "retrieved context");
                hits.into_iter().map(|h| h.chunk.text).collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "similarity search failed");
                Vec::new()
            }
        }
    }
}

async fn embed_chunks(embedder: &dyn Embed, chunks: &[DocumentChunk]) -> Result<Vec<Vec<f32>>> {
    let mut embeddings = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(EMBED_BATCH) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        embeddings.extend(vectors);
    }

    Ok(embeddings)
}

/// Build the store in `staging`, then rename it to `dest`
fn build_file(
    staging: &Path,
    dest: &Path,
    chunks: &[DocumentChunk],
    embeddings: &[Vec<f32>],
    name: &str,
) -> Result<PathBuf> {
    let dimension = embeddings.first().map_or(0, Vec::len);
    let store = VectorStore::create(staging, dimension)?;
    store.insert(chunks, embeddings)?;
    store.set_document_name(name)?;
    store.persist(dest)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".building");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/data/index/friday.sqlite")),
            PathBuf::from("/data/index/friday.sqlite.building")
        );
    }

    #[tokio::test]
    async fn test_empty_index() {
        let index = DocumentIndex::in_memory(TextSplitter::default());
        assert!(index.document_name().await.is_none());
        assert!(index.query_index("anything", 3, None).await.is_empty());
        assert!(!index.clear_index().await);
    }

    #[tokio::test]
    async fn test_upload_without_embedder_fails() {
        let index = DocumentIndex::in_memory(TextSplitter::default());
        let memory = ConversationMemory::new();

        let result = index
            .index_document(b"some text".to_vec(), "notes.txt", None, &memory)
            .await;

        assert!(matches!(result, Err(Error::Unavailable(_))));
        assert!(index.document_name().await.is_none());
    }
}
