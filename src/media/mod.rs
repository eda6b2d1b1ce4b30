//! Generated audio files served back to clients
//!
//! Spoken replies are written under the temp audio directory with random
//! names and fetched by name. Old files are swept at startup and shutdown.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::{Error, Result};

/// Age after which generated audio is deleted
pub const MAX_AUDIO_AGE: Duration = Duration::from_secs(2 * 60 * 60);

/// Directory of generated audio
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    /// Open the store, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write audio under a fresh name; returns the file name
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub async fn save(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let filename = format!("response_{}.{extension}", uuid::Uuid::new_v4());
        tokio::fs::write(self.dir.join(&filename), bytes).await?;

        tracing::debug!(file = %filename, bytes = bytes.len(), "audio saved");
        Ok(filename)
    }

    /// Path of a stored file
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the name is not a plain file name or no such file exists
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let plain = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(['/', '\\'])
            && Path::new(filename).file_name().is_some_and(|n| n == filename);

        if !plain {
            return Err(Error::NotFound(format!("audio file {filename}")));
        }

        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(Error::NotFound(format!("audio file {filename}")));
        }

        Ok(path)
    }

    /// Delete files last modified more than `max_age` ago; returns how many
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read
    pub fn clean_older_than(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.dir)? {
            let Ok(entry) = entry else { continue };
            let Ok(metadata) = entry.metadata() else { continue };
            if !metadata.is_file() {
                continue;
            }

            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);

            if expired {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, file = %entry.path().display(), "failed to remove old audio");
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, dir = %self.dir.display(), "removed old audio files");
        }
        Ok(removed)
    }
}
