//! sqlite-vec backed store of document chunks and their embeddings
//!
//! A store is built once (create, insert), optionally persisted by renaming
//! its file into place, and reopened with [`VectorStore::load`]. It is never
//! mutated after the build; replacing a document means building a new store.

use std::path::{Path, PathBuf};

use rusqlite::OptionalExtension;

use super::embedder::Embedder;
use super::{DbPool, schema};
use crate::knowledge::DocumentChunk;
use crate::{Error, Result};

const META_DOCUMENT: &str = "document_name";
const META_DIMENSION: &str = "dimension";
const META_CREATED: &str = "created_at";

/// A chunk returned by similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The matching chunk
    pub chunk: DocumentChunk,
    /// L2 distance to the query (smaller is closer)
    pub distance: f32,
}

/// Embedded chunks of one document
#[derive(Debug)]
pub struct VectorStore {
    pool: DbPool,
    path: Option<PathBuf>,
    dimension: usize,
}

impl VectorStore {
    /// Create an empty store at `path` for embeddings of `dimension` floats
    ///
    /// Any file already at `path` is replaced.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or the schema fails
    pub fn create(path: &Path, dimension: usize) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = super::open(path)?;
        Self::prepare(pool, Some(path.to_path_buf()), dimension)
    }

    /// Create an empty in-memory store
    ///
    /// # Errors
    ///
    /// Returns error if the schema fails
    pub fn create_memory(dimension: usize) -> Result<Self> {
        let pool = super::open_memory()?;
        Self::prepare(pool, None, dimension)
    }

    fn prepare(pool: DbPool, path: Option<PathBuf>, dimension: usize) -> Result<Self> {
        {
            let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
            schema::create_vector_table(&conn, dimension)?;
        }

        let store = Self {
            pool,
            path,
            dimension,
        };
        store.set_meta(META_DIMENSION, &dimension.to_string())?;
        store.set_meta(META_CREATED, &chrono::Utc::now().to_rfc3339())?;
        Ok(store)
    }

    /// Reopen a persisted store
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no file exists, or an error if it is not a valid store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        let pool = super::open(path)?;
        let store = Self {
            pool,
            path: Some(path.to_path_buf()),
            dimension: 0,
        };

        let dimension = store
            .meta(META_DIMENSION)?
            .and_then(|d| d.parse::<usize>().ok())
            .ok_or_else(|| Error::Database("store has no embedding dimension".to_string()))?;

        Ok(Self { dimension, ..store })
    }

    /// Insert chunks with their embeddings in one transaction
    ///
    /// # Errors
    ///
    /// Returns error if counts or dimensions mismatch, or the insert fails
    pub fn insert(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(Error::Embedding(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(Error::Embedding(format!(
                "embedding has {} dimensions, store expects {}",
                bad.len(),
                self.dimension
            )));
        }

        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let tx = conn.transaction()?;

        {
            let mut insert_chunk = tx.prepare(
                "INSERT INTO chunks (id, chunk_id, source, content) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut insert_vec =
                tx.prepare("INSERT INTO chunks_vec (rowid, embedding) VALUES (?1, ?2)")?;

            for (row, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
                #[allow(clippy::cast_possible_wrap)]
                let rowid = row as i64 + 1;
                #[allow(clippy::cast_possible_wrap)]
                let chunk_id = chunk.id as i64;

                insert_chunk.execute(rusqlite::params![rowid, chunk_id, chunk.source, chunk.text])?;
                insert_vec.execute(rusqlite::params![rowid, Embedder::to_bytes(embedding)])?;
            }
        }

        tx.commit()?;

        tracing::debug!(count = chunks.len(), "chunks inserted");
        Ok(chunks.len())
    }

    /// Find the `k` chunks closest to `query`
    ///
    /// # Errors
    ///
    /// Returns error if the dimension mismatches or the query fails
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "query has {} dimensions, store expects {}",
                query.len(),
                self.dimension
            )));
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            r"SELECT c.chunk_id, c.source, c.content, v.distance
              FROM (
                  SELECT rowid, distance
                  FROM chunks_vec
                  WHERE embedding MATCH ?1 AND k = ?2
              ) v
              JOIN chunks c ON c.id = v.rowid
              ORDER BY v.distance",
        )?;

        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt.query_map(
            rusqlite::params![Embedder::to_bytes(query), k as i64],
            |row| {
                let chunk_id: i64 = row.get(0)?;
                Ok(SearchHit {
                    chunk: DocumentChunk {
                        id: usize::try_from(chunk_id).unwrap_or_default(),
                        source: row.get(1)?,
                        text: row.get(2)?,
                    },
                    distance: row.get(3)?,
                })
            },
        )?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }

        Ok(hits)
    }

    /// All chunks in insertion order
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn chunks(&self) -> Result<Vec<DocumentChunk>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT chunk_id, source, content FROM chunks ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let chunk_id: i64 = row.get(0)?;
            Ok(DocumentChunk {
                id: usize::try_from(chunk_id).unwrap_or_default(),
                source: row.get(1)?,
                text: row.get(2)?,
            })
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }

        Ok(chunks)
    }

    /// Number of stored chunks
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn len(&self) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Whether the store holds no chunks
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Record the name of the indexed document
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn set_document_name(&self, name: &str) -> Result<()> {
        self.set_meta(META_DOCUMENT, name)
    }

    /// Name of the indexed document, if recorded
    ///
    /// # Errors
    ///
    /// Returns error if the read fails
    pub fn document_name(&self) -> Result<Option<String>> {
        self.meta(META_DOCUMENT)
    }

    /// Embedding dimension
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Backing file, `None` for in-memory stores
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Move the store file to `dest`
    ///
    /// Closes every connection, then renames the file into place so readers
    /// of `dest` never see a half-written store.
    ///
    /// # Errors
    ///
    /// Returns error for in-memory stores or if the rename fails
    pub fn persist(self, dest: &Path) -> Result<PathBuf> {
        let Some(source) = self.path.clone() else {
            return Err(Error::Database(
                "in-memory store cannot be persisted".to_string(),
            ));
        };

        drop(self);

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&source, dest)?;

        tracing::debug!(path = %dest.display(), "store persisted");
        Ok(dest.to_path_buf())
    }

    /// Delete a persisted store file; returns whether one existed
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn remove_file(path: &Path) -> Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let value = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: usize, text: &str) -> DocumentChunk {
        DocumentChunk {
            id,
            source: "notes.pdf".to_string(),
            text: text.to_string(),
        }
    }

    fn sample_store() -> VectorStore {
        let store = VectorStore::create_memory(3).unwrap();
        store
            .insert(
                &[chunk(0, "alpha"), chunk(1, "beta"), chunk(2, "gamma")],
                &[
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.0, 0.0, 1.0],
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_search_orders_by_distance() {
        let store = sample_store();
        let hits = store.search(&[0.1, 0.9, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "beta");
        assert_eq!(hits[0].chunk.id, 1);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_search_k_larger_than_store() {
        let store = sample_store();
        assert_eq!(store.search(&[1.0, 0.0, 0.0], 10).unwrap().len(), 3);
        assert!(store.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let store = sample_store();
        assert!(store.search(&[1.0, 0.0], 1).is_err());
        assert!(store.insert(&[chunk(3, "delta")], &[vec![1.0]]).is_err());
        assert!(store.insert(&[chunk(3, "delta")], &[]).is_err());
    }

    #[test]
    fn test_meta_and_counts() {
        let store = sample_store();
        assert_eq!(store.len().unwrap(), 3);
        assert!(store.document_name().unwrap().is_none());

        store.set_document_name("notes.pdf").unwrap();
        assert_eq!(store.document_name().unwrap().as_deref(), Some("notes.pdf"));

        let chunks = store.chunks().unwrap();
        assert_eq!(chunks.iter().map(|c| c.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_memory_store_cannot_persist() {
        let store = VectorStore::create_memory(2).unwrap();
        assert!(store.persist(Path::new("/tmp/never.sqlite")).is_err());
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("index.sqlite.building");
        let dest = dir.path().join("index.sqlite");

        let store = VectorStore::create(&staging, 3).unwrap();
        store
            .insert(&[chunk(0, "alpha"), chunk(1, "beta")], &[
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
            ])
            .unwrap();
        store.set_document_name("notes.pdf").unwrap();
        store.persist(&dest).unwrap();

        assert!(!staging.exists());

        let loaded = VectorStore::load(&dest).unwrap();
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.document_name().unwrap().as_deref(), Some("notes.pdf"));
        assert_eq!(loaded.search(&[1.0, 0.0, 0.0], 1).unwrap()[0].chunk.text, "alpha");

        drop(loaded);
        assert!(VectorStore::remove_file(&dest).unwrap());
        assert!(!VectorStore::remove_file(&dest).unwrap());
        assert!(matches!(VectorStore::load(&dest), Err(Error::NotFound(_))));
    }
}
