//! Plain-text file backend.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `WORKBENCH_DATA_DIR`: Directory holding the documents (default: `data`)
//! - `WORKBENCH_STUDENTS_FILE`: Student document name (default: `students.txt`)
//! - `WORKBENCH_DICTIONARY_FILE`: Dictionary document name (default: `dictionary.txt`)
//! - `WORKBENCH_MAP_FILE`: Campus map document name (default: `campus_map.txt`)
//!
//! Whole-document writes go to a sibling temporary file that is renamed over
//! the target, so a crash mid-write leaves the previous document intact.
//! Concurrent writers in different processes are not coordinated.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::types::Collection;
use super::TextBackend;

/// Configuration for the file backend.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Directory holding all documents.
    pub data_dir: PathBuf,
    /// Student document file name.
    pub students_file: String,
    /// Dictionary document file name.
    pub dictionary_file: String,
    /// Map document file name.
    pub map_file: String,
}

impl FileStoreConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("WORKBENCH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            students_file: std::env::var("WORKBENCH_STUDENTS_FILE")
                .unwrap_or_else(|_| "students.txt".to_string()),
            dictionary_file: std::env::var("WORKBENCH_DICTIONARY_FILE")
                .unwrap_or_else(|_| "dictionary.txt".to_string()),
            map_file: std::env::var("WORKBENCH_MAP_FILE")
                .unwrap_or_else(|_| "campus_map.txt".to_string()),
        }
    }

    /// Default file names under an explicit directory.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            students_file: "students.txt".to_string(),
            dictionary_file: "dictionary.txt".to_string(),
            map_file: "campus_map.txt".to_string(),
        }
    }

    /// Path of a collection's document.
    pub fn path_for(&self, collection: Collection) -> PathBuf {
        let name = match collection {
            Collection::Students => &self.students_file,
            Collection::Dictionary => &self.dictionary_file,
            Collection::Map => &self.map_file,
        };
        self.data_dir.join(name)
    }
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type for the file backend.
#[derive(Debug, thiserror::Error)]
#[error("I/O error on {path}: {source}")]
pub struct FileBackendError {
    /// Document path.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> FileBackendError + '_ {
    move |source| FileBackendError {
        path: path.to_path_buf(),
        source,
    }
}

/// File backend: one UTF-8 text file per collection.
#[derive(Debug, Clone)]
pub struct FileBackend {
    config: FileStoreConfig,
}

impl FileBackend {
    /// Create a backend with the given configuration.
    pub fn new(config: FileStoreConfig) -> Self {
        tracing::debug!(data_dir = %config.data_dir.display(), "Initializing file backend");
        Self { config }
    }

    /// Create a backend from environment variables.
    pub fn from_env() -> Self {
        Self::new(FileStoreConfig::from_env())
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    async fn ensure_dir(&self) -> Result<(), FileBackendError> {
        let dir = &self.config.data_dir;
        fs::create_dir_all(dir).await.map_err(io_err(dir))
    }
}

#[async_trait]
impl TextBackend for FileBackend {
    type Error = FileBackendError;

    async fn read(&self, collection: Collection) -> Result<Option<String>, Self::Error> {
        let path = self.config.path_for(collection);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    async fn write(&self, collection: Collection, text: &str) -> Result<(), Self::Error> {
        self.ensure_dir().await?;
        let path = self.config.path_for(collection);
        let tmp = path.with_extension("tmp");

        fs::write(&tmp, text).await.map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).await.map_err(io_err(&path))?;

        tracing::debug!(path = %path.display(), bytes = text.len(), "Document rewritten");
        Ok(())
    }

    async fn append_line(&self, collection: Collection, line: &str) -> Result<(), Self::Error> {
        self.ensure_dir().await?;
        let path = self.config.path_for(collection);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err(&path))?;

        let len = file.metadata().await.map_err(io_err(&path))?.len();
        let mut buf = String::with_capacity(line.len() + 2);
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await.map_err(io_err(&path))?;
            file.read_exact(&mut last).await.map_err(io_err(&path))?;
            if last[0] != b'\n' {
                buf.push('\n');
            }
        }
        buf.push_str(line);
        buf.push('\n');

        file.write_all(buf.as_bytes()).await.map_err(io_err(&path))?;
        file.flush().await.map_err(io_err(&path))?;
        Ok(())
    }

    fn location(&self, collection: Collection) -> Option<PathBuf> {
        Some(self.config.path_for(collection))
    }
}
