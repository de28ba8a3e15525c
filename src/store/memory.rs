//! In-memory document backend for testing.

use std::collections::BTreeMap;
use std::convert::Infallible;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::Collection;
use super::TextBackend;

/// In-memory document backend for testing.
///
/// Uses a BTreeMap for deterministic iteration order. A collection with no
/// entry behaves like a missing file.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    documents: RwLock<BTreeMap<Collection, String>>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with a pre-existing document.
    pub fn with_document(self, collection: Collection, text: impl Into<String>) -> Self {
        self.documents.write().insert(collection, text.into());
        self
    }

    /// Get a copy of a document.
    pub fn document(&self, collection: Collection) -> Option<String> {
        self.documents.read().get(&collection).cloned()
    }

    /// Get number of stored documents.
    pub fn num_documents(&self) -> usize {
        self.documents.read().len()
    }
}

#[async_trait]
impl TextBackend for InMemoryBackend {
    type Error = Infallible;

    async fn read(&self, collection: Collection) -> Result<Option<String>, Self::Error> {
        Ok(self.document(collection))
    }

    async fn write(&self, collection: Collection, text: &str) -> Result<(), Self::Error> {
        self.documents.write().insert(collection, text.to_string());
        Ok(())
    }

    async fn append_line(&self, collection: Collection, line: &str) -> Result<(), Self::Error> {
        let mut documents = self.documents.write();
        let doc = documents.entry(collection).or_default();
        if !doc.is_empty() && !doc.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str(line);
        doc.push('\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_document_reads_none() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.read(Collection::Students).await.unwrap(), None);
        assert_eq!(backend.num_documents(), 0);
    }

    #[tokio::test]
    async fn test_append_repairs_trailing_newline() {
        let backend = InMemoryBackend::new().with_document(Collection::Dictionary, "Cat:猫");

        backend.append_line(Collection::Dictionary, "Dog:狗").await.unwrap();

        assert_eq!(
            backend.document(Collection::Dictionary).as_deref(),
            Some("Cat:猫\nDog:狗\n")
        );
    }

    #[tokio::test]
    async fn test_append_creates_document() {
        let backend = InMemoryBackend::new();
        backend.append_line(Collection::Students, "1 A 2").await.unwrap();
        assert_eq!(backend.document(Collection::Students).as_deref(), Some("1 A 2\n"));
    }
}
