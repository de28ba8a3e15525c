//! Text-file-backed record storage.
//!
//! A [`TextBackend`] persists one plain-text document per [`Collection`].
//! [`SegmentedStore`] layers the record discipline on top: lazy seeding,
//! typed parsing, append, delete-by-key with full rewrite, and bulk rewrite.

pub mod memory;
pub mod file;
pub mod segmented;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::format::FieldError;
use crate::types::Collection;

/// Trait for document storage backends.
///
/// A backend knows nothing about record grammars; it reads, replaces and
/// appends whole lines of text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Error type for backend operations.
    type Error: std::error::Error + Send + Sync;

    /// Read the whole document, or `None` if it does not exist yet.
    async fn read(&self, collection: Collection) -> Result<Option<String>, Self::Error>;

    /// Replace the whole document, creating it if needed.
    async fn write(&self, collection: Collection, text: &str) -> Result<(), Self::Error>;

    /// Append one line, creating the document if needed.
    ///
    /// A missing trailing newline on the existing document is repaired first
    /// so the appended line never merges into the previous one.
    async fn append_line(&self, collection: Collection, line: &str) -> Result<(), Self::Error>;

    /// Filesystem location of the document, for backends that have one.
    fn location(&self, _collection: Collection) -> Option<PathBuf> {
        None
    }
}

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend I/O failed.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Record fields would not survive serialization.
    #[error("Invalid {collection} record: {source}")]
    InvalidRecord {
        /// Target collection.
        collection: Collection,
        /// Offending field.
        #[source]
        source: FieldError,
    },
    /// Key already present and duplicates are rejected.
    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey {
        /// Target collection.
        collection: Collection,
        /// The existing key.
        key: String,
    },
}

impl StoreError {
    /// Create a backend error from any error type.
    pub fn from_backend<E: std::error::Error>(e: E) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Outcome of a delete. A miss is a value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteOutcome {
    /// This many lines were removed.
    Removed(usize),
    /// No line matched; the document was left unchanged.
    NotFound,
}

impl DeleteOutcome {
    fn from_count(removed: usize) -> Self {
        if removed == 0 {
            Self::NotFound
        } else {
            Self::Removed(removed)
        }
    }

    /// Whether anything was removed.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Removed(_))
    }
}

/// Key uniqueness policy applied on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Reject a record whose key already exists in its collection.
    #[default]
    Reject,
    /// Append without looking at existing keys.
    Allow,
}

impl DuplicatePolicy {
    /// Parse policy from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reject" | "unique" => Some(Self::Reject),
            "allow" | "permit" => Some(Self::Allow),
            _ => None,
        }
    }
}

pub use memory::InMemoryBackend;
pub use file::{FileBackend, FileBackendError, FileStoreConfig};
pub use segmented::{MapContents, SegmentedStore};
