//! Embedding backends and the sqlite-vec document store
//!
//! Each indexed document lives in its own store file; [`open`] and
//! [`open_memory`] hand [`VectorStore`] a migrated pool with `vec0` available.

pub mod embedder;
mod schema;
pub mod vector;

use std::path::Path;
use std::sync::Once;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

pub use embedder::{Embed, Embedder, OLLAMA_BASE_URL};
pub use schema::SCHEMA_VERSION;
pub use vector::{SearchHit, VectorStore};

/// Pool over one store file
pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection checked out of a [`DbPool`]
pub type DbConn = PooledConnection<SqliteConnectionManager>;

static SQLITE_VEC: Once = Once::new();

/// Make `vec0` available to every connection opened afterwards
#[allow(unsafe_code)]
fn load_sqlite_vec() {
    SQLITE_VEC.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is the extension entry point; the cast
        // only restores the signature `sqlite3_auto_extension` expects.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute::<
                *const (),
                unsafe extern "C" fn(
                    *mut rusqlite::ffi::sqlite3,
                    *mut *mut i8,
                    *const rusqlite::ffi::sqlite3_api_routines,
                ) -> i32,
            >(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    });
}

fn open_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    load_sqlite_vec();

    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;
    Ok(pool)
}

/// Open (or create) the store file at `path`
///
/// # Errors
///
/// Returns error if the file cannot be opened or migrated
pub fn open(path: &Path) -> Result<DbPool> {
    let pool = open_pool(SqliteConnectionManager::file(path), 4)?;
    tracing::debug!(path = %path.display(), version = SCHEMA_VERSION, "store opened");
    Ok(pool)
}

/// Open a private in-memory store
///
/// A single connection, so every checkout sees the same tables.
///
/// # Errors
///
/// Returns error if the schema cannot be created
pub fn open_memory() -> Result<DbPool> {
    open_pool(SqliteConnectionManager::memory(), 1)
}
