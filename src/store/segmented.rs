//! Record discipline over a text backend.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::format::{self, ParseReport, Section, EDGES_MARKER};
use crate::seed::seed_for;
use crate::types::{
    Collection, DictionaryEntry, Edge, Location, LocationId, MapRecord, Record, StudentRecord,
};
use super::{DeleteOutcome, DuplicatePolicy, StoreError, TextBackend};

/// Locations and edges of the map document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapContents {
    /// Records of the `LOCATIONS` section.
    pub locations: Vec<Location>,
    /// Records of the `EDGES` section.
    pub edges: Vec<Edge>,
}

impl From<Vec<MapRecord>> for MapContents {
    fn from(records: Vec<MapRecord>) -> Self {
        let mut contents = Self::default();
        for record in records {
            match record {
                MapRecord::Location(l) => contents.locations.push(l),
                MapRecord::Edge(e) => contents.edges.push(e),
            }
        }
        contents
    }
}

/// Segmented text store.
///
/// ## Discipline
///
/// - A collection whose document is absent is created with its seed on
///   first access; reads never fail for a missing document.
/// - Records are added by appending one line (map locations are the
///   exception: they are inserted into the `LOCATIONS` section).
/// - Records are removed by reading the whole document, filtering on an exact
///   key token, and rewriting it.
/// - There is no update in place; a change is delete + append.
///
/// Read-modify-write sequences are serialized within this process. Writers in
/// other processes are not coordinated (last writer wins).
pub struct SegmentedStore<B: TextBackend> {
    backend: Arc<B>,
    policy: DuplicatePolicy,
    write_lock: Mutex<()>,
}

impl<B: TextBackend> SegmentedStore<B> {
    /// Create a store over a backend.
    pub fn new(backend: Arc<B>, policy: DuplicatePolicy) -> Self {
        Self {
            backend,
            policy,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Get the duplicate-key policy.
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Read a document, seeding it first if absent. Caller holds the lock.
    async fn load(&self, collection: Collection) -> Result<String, StoreError> {
        if let Some(text) = self
            .backend
            .read(collection)
            .await
            .map_err(StoreError::from_backend)?
        {
            return Ok(text);
        }

        let seed = seed_for(collection);
        info!(collection = %collection, "Seeding missing collection");
        self.backend
            .write(collection, seed)
            .await
            .map_err(StoreError::from_backend)?;
        Ok(seed.to_string())
    }

    /// Open a collection and return its raw lines.
    ///
    /// Never fails for a missing document: it is created with seed content.
    pub async fn open(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let text = self.load(collection).await?;
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Open a collection and return its whole document text.
    pub async fn text(&self, collection: Collection) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.load(collection).await
    }

    /// Parse a collection into tagged records, with dropped-line diagnostics.
    pub async fn parse(&self, collection: Collection) -> Result<ParseReport<Record>, StoreError> {
        let text = self.text(collection).await?;
        Ok(format::parse_records(collection, &text))
    }

    /// Parse the student collection.
    pub async fn students(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let text = self.text(Collection::Students).await?;
        Ok(format::parse_students(&text).records)
    }

    /// Parse the dictionary collection.
    pub async fn dictionary(&self) -> Result<Vec<DictionaryEntry>, StoreError> {
        let text = self.text(Collection::Dictionary).await?;
        Ok(format::parse_dictionary(&text).records)
    }

    /// Parse the map collection.
    pub async fn map(&self) -> Result<MapContents, StoreError> {
        let text = self.text(Collection::Map).await?;
        Ok(format::parse_map(&text).records.into())
    }

    /// Append one record to its collection.
    ///
    /// Fields are validated so the record parses back unchanged. Under
    /// [`DuplicatePolicy::Reject`] a keyed record whose key is already present
    /// is refused.
    pub async fn append(&self, record: impl Into<Record>) -> Result<(), StoreError> {
        let record = record.into();
        let collection = record.collection();
        let line = format::record_line(&record)
            .map_err(|source| StoreError::InvalidRecord { collection, source })?;

        let _guard = self.write_lock.lock().await;
        let text = self.load(collection).await?;

        if self.policy == DuplicatePolicy::Reject {
            if let Some(key) = record.key() {
                let taken = format::parse_records(collection, &text)
                    .records
                    .iter()
                    .any(|existing| {
                        std::mem::discriminant(existing) == std::mem::discriminant(&record)
                            && existing.key() == Some(key)
                    });
                if taken {
                    return Err(StoreError::DuplicateKey {
                        collection,
                        key: key.to_string(),
                    });
                }
            }
        }

        match &record {
            Record::Location(_) => {
                let rewritten = format::insert_location_line(&text, &line);
                self.backend
                    .write(collection, &rewritten)
                    .await
                    .map_err(StoreError::from_backend)?;
            }
            Record::Edge(_) => {
                if format::trailing_section(&text) != Section::Edges {
                    self.backend
                        .append_line(collection, EDGES_MARKER)
                        .await
                        .map_err(StoreError::from_backend)?;
                }
                self.backend
                    .append_line(collection, &line)
                    .await
                    .map_err(StoreError::from_backend)?;
            }
            _ => {
                self.backend
                    .append_line(collection, &line)
                    .await
                    .map_err(StoreError::from_backend)?;
            }
        }

        debug!(collection = %collection, line = %line, "Record appended");
        Ok(())
    }

    /// Delete every record whose key token equals `key` exactly.
    ///
    /// Matching is on the whole delimiter-bounded key field, never a
    /// substring: deleting `"10"` leaves `"100"` in place. For the map, only
    /// locations are keyed; edges referencing the id are kept. A miss leaves
    /// the document untouched and returns [`DeleteOutcome::NotFound`].
    pub async fn delete_by_key(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<DeleteOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        let text = self.load(collection).await?;

        let (rewritten, removed) = format::retain_without_key(collection, &text, key);
        self.commit_removal(collection, &rewritten, removed).await
    }

    /// Delete every edge joining `a` and `b`, in either direction.
    pub async fn delete_edges(
        &self,
        a: &LocationId,
        b: &LocationId,
    ) -> Result<DeleteOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        let text = self.load(Collection::Map).await?;

        let (rewritten, removed) = format::retain_without_edge(&text, a, b);
        self.commit_removal(Collection::Map, &rewritten, removed).await
    }

    async fn commit_removal(
        &self,
        collection: Collection,
        rewritten: &str,
        removed: usize,
    ) -> Result<DeleteOutcome, StoreError> {
        let outcome = DeleteOutcome::from_count(removed);
        if outcome.is_found() {
            self.backend
                .write(collection, rewritten)
                .await
                .map_err(StoreError::from_backend)?;
        }
        debug!(collection = %collection, removed, "Delete applied");
        Ok(outcome)
    }

    /// Replace a collection's document unconditionally.
    ///
    /// No schema validation is performed; malformed lines surface as skipped
    /// lines on the next parse.
    pub async fn rewrite(&self, collection: Collection, full_text: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.backend
            .write(collection, full_text)
            .await
            .map_err(StoreError::from_backend)?;
        info!(collection = %collection, bytes = full_text.len(), "Collection rewritten");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{DICTIONARY_SEED, STUDENTS_SEED};
    use crate::store::InMemoryBackend;

    fn store_with(backend: InMemoryBackend) -> SegmentedStore<InMemoryBackend> {
        SegmentedStore::new(Arc::new(backend), DuplicatePolicy::Reject)
    }

    #[tokio::test]
    async fn test_open_seeds_once() {
        let store = store_with(InMemoryBackend::new());

        let first = store.open(Collection::Students).await.unwrap();
        let second = store.open(Collection::Students).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert_eq!(
            store.backend().document(Collection::Students).as_deref(),
            Some(STUDENTS_SEED)
        );
    }

    #[tokio::test]
    async fn test_existing_document_is_not_seeded() {
        let store = store_with(InMemoryBackend::new().with_document(Collection::Dictionary, ""));
        assert!(store.dictionary().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_parse_round_trips() {
        let store = store_with(InMemoryBackend::new());

        let student = StudentRecord::new("2001", "Zed", 61.25);
        store.append(student.clone()).await.unwrap();
        assert_eq!(store.students().await.unwrap().last(), Some(&student));

        let entry = DictionaryEntry::new("Time", "时间: 一种度量");
        store.append(entry.clone()).await.unwrap();
        assert_eq!(store.dictionary().await.unwrap().last(), Some(&entry));

        let location = Location::new("8", 60, "实验楼", "lab block east");
        store.append(location.clone()).await.unwrap();
        let edge = Edge::new("8", "5", 120);
        store.append(edge.clone()).await.unwrap();

        let map = store.map().await.unwrap();
        assert_eq!(map.locations.last(), Some(&location));
        assert_eq!(map.edges.last(), Some(&edge));
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let store = store_with(InMemoryBackend::new());

        let err = store
            .append(StudentRecord::new("1001", "Other", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { key, .. } if key == "1001"));
    }

    #[tokio::test]
    async fn test_duplicate_key_allowed_by_policy() {
        let store = SegmentedStore::new(Arc::new(InMemoryBackend::new()), DuplicatePolicy::Allow);

        store.append(DictionaryEntry::new("Cat", "小猫")).await.unwrap();

        let cats = store
            .dictionary()
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.word == "Cat")
            .count();
        assert_eq!(cats, 2);
    }

    #[tokio::test]
    async fn test_edges_are_never_duplicate_keys() {
        let store = store_with(InMemoryBackend::new());
        store.append(Edge::new("1", "5", 200)).await.unwrap();

        let parallel = store
            .map()
            .await
            .unwrap()
            .edges
            .iter()
            .filter(|e| e.connects(&"1".into(), &"5".into()))
            .count();
        assert_eq!(parallel, 2);
    }

    #[tokio::test]
    async fn test_invalid_record_rejected_before_write() {
        let store = store_with(InMemoryBackend::new());
        let err = store
            .append(DictionaryEntry::new("Bad:Word", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { collection: Collection::Dictionary, .. }));
        assert_eq!(store.backend().num_documents(), 0);
    }

    #[tokio::test]
    async fn test_delete_exact_key() {
        let store = store_with(
            InMemoryBackend::new().with_document(Collection::Students, "10 A 1\n100 B 2\n1 C 3\n"),
        );

        let outcome = store.delete_by_key(Collection::Students, "10").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed(1));

        let ids: Vec<_> = store.students().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["100", "1"]);
    }

    #[tokio::test]
    async fn test_delete_miss_leaves_document() {
        let store = store_with(InMemoryBackend::new());
        store.open(Collection::Dictionary).await.unwrap();

        let outcome = store.delete_by_key(Collection::Dictionary, "App").await.unwrap();

        assert_eq!(outcome, DeleteOutcome::NotFound);
        assert_eq!(
            store.backend().document(Collection::Dictionary).as_deref(),
            Some(DICTIONARY_SEED)
        );
    }

    #[tokio::test]
    async fn test_delete_location_keeps_edges() {
        let store = store_with(InMemoryBackend::new());

        let outcome = store.delete_by_key(Collection::Map, "7").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed(1));

        let map = store.map().await.unwrap();
        assert_eq!(map.locations.len(), 6);
        assert_eq!(map.edges.len(), 9);
    }

    #[tokio::test]
    async fn test_delete_edges() {
        let store = store_with(InMemoryBackend::new());

        let outcome = store.delete_edges(&"4".into(), &"3".into()).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed(1));
        assert_eq!(store.map().await.unwrap().edges.len(), 8);
    }

    #[tokio::test]
    async fn test_edge_append_restores_marker() {
        let store = store_with(
            InMemoryBackend::new().with_document(Collection::Map, "LOCATIONS\n1 80 Gate\n"),
        );

        store.append(Edge::new("1", "2", 10)).await.unwrap();

        assert_eq!(
            store.backend().document(Collection::Map).as_deref(),
            Some("LOCATIONS\n1 80 Gate\nEDGES\n1 2 10\n")
        );
    }

    #[tokio::test]
    async fn test_rewrite_is_unvalidated() {
        let store = store_with(InMemoryBackend::new());

        store.rewrite(Collection::Students, "1 A 90\nbroken\n").await.unwrap();

        let report = store.parse(Collection::Students).await.unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line_no, 2);
    }
}
