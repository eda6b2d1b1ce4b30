//! Vector store schema and migrations

use rusqlite::Connection;

use crate::{Error, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the relational part of the schema
///
/// The `chunks_vec` virtual table is created separately by
/// [`create_vector_table`] once the embedding dimension is known.
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Key/value facts about the indexed document
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One row per chunk; id doubles as the rowid in chunks_vec
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY,
            chunk_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            content TEXT NOT NULL
        );

        PRAGMA user_version = 1;
        ",
    )?;

    Ok(())
}

/// Create the sqlite-vec table for embeddings of `dimension` floats
///
/// # Errors
///
/// Returns error if the dimension is zero or the table cannot be created
pub fn create_vector_table(conn: &Connection, dimension: usize) -> Result<()> {
    if dimension == 0 {
        return Err(Error::Database(
            "embedding dimension must be non-zero".to_string(),
        ));
    }

    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_vec USING vec0(embedding float[{dimension}]);"
    ))?;

    Ok(())
}
