//! Per-action composition: read store → invoke bridge → build or merge.
//!
//! Every call takes a [`RequestContext`] created for one user action; there
//! is no session state shared between actions.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use crate::bridge::response::parse_candidates;
use crate::bridge::{
    BridgeError, BridgeRequest, ComputationBridge, CsvTable, OutlineTree, PathOutcome,
    SearchResult, ServiceName, ServiceOutput,
};
use crate::builder::{GraphModel, SearchTree};
use crate::store::{DeleteOutcome, MapContents, SegmentedStore, StoreError, TextBackend};
use crate::types::{Collection, DictionaryEntry, Edge, Location, LocationId, StudentRecord};

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Read a collection.
    Browse(Collection),
    /// Add a record.
    Add(Collection),
    /// Remove a record.
    Remove(Collection),
    /// Replace a whole document.
    Rewrite(Collection),
    /// Run a computation service.
    Compute(ServiceName),
    /// Build a visualization model.
    Visualize(Collection),
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Browse(c) => write!(f, "browse:{c}"),
            Self::Add(c) => write!(f, "add:{c}"),
            Self::Remove(c) => write!(f, "remove:{c}"),
            Self::Rewrite(c) => write!(f, "rewrite:{c}"),
            Self::Compute(s) => write!(f, "compute:{s}"),
            Self::Visualize(c) => write!(f, "visualize:{c}"),
        }
    }
}

/// Request-scoped context for one user action.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id for logs.
    pub request_id: Uuid,
    /// When the action started.
    pub started_at: DateTime<Utc>,
    /// What was asked for.
    pub intent: Intent,
}

impl RequestContext {
    /// Create a context for a new action.
    pub fn new(intent: Intent) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            intent,
        }
    }

    /// Tracing span carrying the request id and intent.
    pub fn span(&self) -> Span {
        info_span!("request", request_id = %self.request_id, intent = %self.intent)
    }

    /// Milliseconds since the action started.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

/// Error type for workbench operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Computation service failure, surfaced verbatim.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Student sort order offered by the computation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending by id.
    Id,
    /// Descending by score.
    Score,
}

impl SortKey {
    /// Service implementing this order.
    pub fn service(&self) -> ServiceName {
        match self {
            Self::Id => ServiceName::SortId,
            Self::Score => ServiceName::SortScore,
        }
    }
}

/// Shared shell over the store, the bridge and the builders.
pub struct Workbench<B: TextBackend, C: ComputationBridge> {
    store: SegmentedStore<B>,
    bridge: Arc<C>,
}

impl<B: TextBackend, C: ComputationBridge> Workbench<B, C> {
    /// Create a workbench.
    pub fn new(store: SegmentedStore<B>, bridge: Arc<C>) -> Self {
        Self { store, bridge }
    }

    /// Get the store.
    pub fn store(&self) -> &SegmentedStore<B> {
        &self.store
    }

    /// Attach a collection as service input.
    ///
    /// The document path is appended as the last argument when the backend
    /// has one; otherwise the document is sent on stdin.
    async fn with_input(
        &self,
        request: BridgeRequest,
        collection: Collection,
    ) -> Result<BridgeRequest, WorkbenchError> {
        let text = self.store.text(collection).await?;
        Ok(match self.store.backend().location(collection) {
            Some(path) => request.arg(path.to_string_lossy()),
            None => request.stdin(text),
        })
    }

    async fn compute(
        &self,
        request: BridgeRequest,
        collection: Collection,
    ) -> Result<String, WorkbenchError> {
        let request = self.with_input(request, collection).await?;
        Ok(self.bridge.execute(request).await?)
    }

    // ── students ────────────────────────────────────────────────────────────

    /// Students in store order.
    pub async fn students(&self, ctx: &RequestContext) -> Result<Vec<StudentRecord>, WorkbenchError> {
        async { Ok(self.store.students().await?) }
            .instrument(ctx.span())
            .await
    }

    /// Add a student.
    pub async fn add_student(
        &self,
        ctx: &RequestContext,
        student: StudentRecord,
    ) -> Result<(), WorkbenchError> {
        async { Ok(self.store.append(student).await?) }
            .instrument(ctx.span())
            .await
    }

    /// Remove a student by id.
    pub async fn remove_student(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<DeleteOutcome, WorkbenchError> {
        async { Ok(self.store.delete_by_key(Collection::Students, id).await?) }
            .instrument(ctx.span())
            .await
    }

    /// Students sorted by the computation service.
    pub async fn sorted_students(
        &self,
        ctx: &RequestContext,
        key: SortKey,
    ) -> Result<ServiceOutput<Vec<StudentRecord>>, WorkbenchError> {
        async {
            let out = self
                .compute(key.service().into(), Collection::Students)
                .await?;
            Ok(ServiceOutput::read(out, |raw| CsvTable::parse(raw)?.records()))
        }
        .instrument(ctx.span())
        .await
    }

    // ── dictionary ──────────────────────────────────────────────────────────

    /// Dictionary entries in store order.
    pub async fn words(&self, ctx: &RequestContext) -> Result<Vec<DictionaryEntry>, WorkbenchError> {
        async { Ok(self.store.dictionary().await?) }
            .instrument(ctx.span())
            .await
    }

    /// Add a dictionary entry.
    pub async fn add_word(
        &self,
        ctx: &RequestContext,
        entry: DictionaryEntry,
    ) -> Result<(), WorkbenchError> {
        async { Ok(self.store.append(entry).await?) }
            .instrument(ctx.span())
            .await
    }

    /// Remove a word.
    pub async fn remove_word(
        &self,
        ctx: &RequestContext,
        word: &str,
    ) -> Result<DeleteOutcome, WorkbenchError> {
        async { Ok(self.store.delete_by_key(Collection::Dictionary, word).await?) }
            .instrument(ctx.span())
            .await
    }

    /// Meaning of a word, from the `search` service.
    pub async fn lookup(
        &self,
        ctx: &RequestContext,
        word: &str,
    ) -> Result<SearchResult, WorkbenchError> {
        async {
            let request = BridgeRequest::from(ServiceName::Search).arg(word);
            let out = self.compute(request, Collection::Dictionary).await?;
            Ok(SearchResult::parse(&out))
        }
        .instrument(ctx.span())
        .await
    }

    /// Words matching a prefix, from the `fuzzy` service.
    pub async fn fuzzy(
        &self,
        ctx: &RequestContext,
        prefix: &str,
    ) -> Result<Vec<String>, WorkbenchError> {
        async {
            let request = BridgeRequest::from(ServiceName::Fuzzy).arg(prefix);
            let out = self.compute(request, Collection::Dictionary).await?;
            Ok(parse_candidates(&out))
        }
        .instrument(ctx.span())
        .await
    }

    /// Search tree built locally from the stored words.
    pub async fn dictionary_tree(&self, ctx: &RequestContext) -> Result<SearchTree, WorkbenchError> {
        async {
            let entries = self.store.dictionary().await?;
            let tree = SearchTree::from_entries(&entries);
            tracing::debug!(
                nodes = tree.len(),
                skipped = tree.skipped().len(),
                height = tree.height(),
                "Dictionary tree built"
            );
            Ok(tree)
        }
        .instrument(ctx.span())
        .await
    }

    /// Tree structure reported by the `print_tree` service.
    pub async fn remote_tree(
        &self,
        ctx: &RequestContext,
    ) -> Result<ServiceOutput<OutlineTree>, WorkbenchError> {
        async {
            let out = self
                .compute(ServiceName::PrintTree.into(), Collection::Dictionary)
                .await?;
            Ok(ServiceOutput::read(out, OutlineTree::parse))
        }
        .instrument(ctx.span())
        .await
    }

    // ── campus map ──────────────────────────────────────────────────────────

    /// Locations and edges in store order.
    pub async fn map(&self, ctx: &RequestContext) -> Result<MapContents, WorkbenchError> {
        async { Ok(self.store.map().await?) }
            .instrument(ctx.span())
            .await
    }

    /// Add a location.
    pub async fn add_location(
        &self,
        ctx: &RequestContext,
        location: Location,
    ) -> Result<(), WorkbenchError> {
        async { Ok(self.store.append(location).await?) }
            .instrument(ctx.span())
            .await
    }

    /// Add an edge.
    pub async fn add_edge(&self, ctx: &RequestContext, edge: Edge) -> Result<(), WorkbenchError> {
        async { Ok(self.store.append(edge).await?) }
            .instrument(ctx.span())
            .await
    }

    /// Remove a location by id. Edges referencing it are kept.
    pub async fn remove_location(
        &self,
        ctx: &RequestContext,
        id: &LocationId,
    ) -> Result<DeleteOutcome, WorkbenchError> {
        async { Ok(self.store.delete_by_key(Collection::Map, id.as_str()).await?) }
            .instrument(ctx.span())
            .await
    }

    /// Remove every edge between two locations.
    pub async fn remove_edges(
        &self,
        ctx: &RequestContext,
        a: &LocationId,
        b: &LocationId,
    ) -> Result<DeleteOutcome, WorkbenchError> {
        async { Ok(self.store.delete_edges(a, b).await?) }
            .instrument(ctx.span())
            .await
    }

    /// Graph model built locally from the stored map.
    pub async fn campus_graph(&self, ctx: &RequestContext) -> Result<GraphModel, WorkbenchError> {
        async {
            let contents = self.store.map().await?;
            Ok(GraphModel::from_contents(&contents))
        }
        .instrument(ctx.span())
        .await
    }

    /// Shortest path between two locations, from the `path` service.
    pub async fn shortest_path(
        &self,
        ctx: &RequestContext,
        from: &LocationId,
        to: &LocationId,
    ) -> Result<PathOutcome, WorkbenchError> {
        async {
            let request = BridgeRequest::from(ServiceName::Path)
                .arg(from.as_str())
                .arg(to.as_str());
            let out = self.compute(request, Collection::Map).await?;
            Ok(PathOutcome::parse(&out))
        }
        .instrument(ctx.span())
        .await
    }

    /// Location listing reported by the `locations` service.
    pub async fn remote_locations(
        &self,
        ctx: &RequestContext,
    ) -> Result<ServiceOutput<Vec<Location>>, WorkbenchError> {
        async {
            let out = self
                .compute(ServiceName::Locations.into(), Collection::Map)
                .await?;
            Ok(ServiceOutput::read(out, |raw| CsvTable::parse(raw)?.records()))
        }
        .instrument(ctx.span())
        .await
    }

    /// Edge listing reported by the `edges` service.
    pub async fn remote_edges(
        &self,
        ctx: &RequestContext,
    ) -> Result<ServiceOutput<Vec<Edge>>, WorkbenchError> {
        async {
            let out = self
                .compute(ServiceName::Edges.into(), Collection::Map)
                .await?;
            Ok(ServiceOutput::read(out, |raw| CsvTable::parse(raw)?.records()))
        }
        .instrument(ctx.span())
        .await
    }

    // ── bulk edit ───────────────────────────────────────────────────────────

    /// Replace a collection's whole document.
    pub async fn rewrite(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        full_text: &str,
    ) -> Result<(), WorkbenchError> {
        async { Ok(self.store.rewrite(collection, full_text).await?) }
            .instrument(ctx.span())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeResponse;
    use crate::store::{DuplicatePolicy, InMemoryBackend};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Returns canned output per service and records every request.
    #[derive(Default)]
    struct ScriptedBridge {
        replies: Vec<(&'static str, Result<&'static str, i32>)>,
        seen: Mutex<Vec<BridgeRequest>>,
    }

    impl ScriptedBridge {
        fn reply(mut self, service: &'static str, out: Result<&'static str, i32>) -> Self {
            self.replies.push((service, out));
            self
        }
    }

    #[async_trait]
    impl ComputationBridge for ScriptedBridge {
        async fn execute(&self, request: BridgeRequest) -> Result<String, BridgeError> {
            self.seen.lock().push(request.clone());
            let (_, reply) = self
                .replies
                .iter()
                .find(|(name, _)| *name == request.service)
                .ok_or_else(|| BridgeError::NotFound(request.service.clone()))?;
            match reply {
                Ok(out) => Ok(out.trim().to_string()),
                Err(code) => Err(BridgeError::Execution {
                    service: request.service.clone(),
                    exit_code: Some(*code),
                    stderr: "failure".to_string(),
                    stdout: String::new(),
                }),
            }
        }
    }

    fn workbench(bridge: ScriptedBridge) -> Workbench<InMemoryBackend, ScriptedBridge> {
        let store = SegmentedStore::new(Arc::new(InMemoryBackend::new()), DuplicatePolicy::Reject);
        Workbench::new(store, Arc::new(bridge))
    }

    #[tokio::test]
    async fn test_sorted_students_parses_csv_and_sends_payload() {
        let bridge = ScriptedBridge::default()
            .reply("sort_score", Ok("id,name,score\n1004,Eve,95.5\n1001,Bob,92\n"));
        let wb = workbench(bridge);
        let ctx = RequestContext::new(Intent::Compute(ServiceName::SortScore));

        let sorted = wb
            .sorted_students(&ctx, SortKey::Score)
            .await
            .unwrap()
            .typed()
            .unwrap();

        assert_eq!(sorted[0], StudentRecord::new("1004", "Eve", 95.5));
        let seen = wb.bridge.seen.lock();
        assert_eq!(seen[0].service, "sort_score");
        assert!(seen[0].stdin.as_deref().unwrap().starts_with("1003 Alice 85.5"));
    }

    #[tokio::test]
    async fn test_lookup_found_and_missing() {
        let wb = workbench(ScriptedBridge::default().reply("search", Ok("苹果")));
        let ctx = RequestContext::new(Intent::Compute(ServiceName::Search));
        assert_eq!(
            wb.lookup(&ctx, "Apple").await.unwrap(),
            SearchResult::Found("苹果".to_string())
        );
        assert_eq!(wb.bridge.seen.lock()[0].args, vec!["Apple"]);

        let wb = workbench(
            ScriptedBridge::default().reply("search", Ok("Word not found in the dictionary.")),
        );
        assert!(matches!(
            wb.lookup(&ctx, "Zebra").await.unwrap(),
            SearchResult::Missing(_)
        ));
    }

    #[tokio::test]
    async fn test_shortest_path_arguments_and_outcome() {
        let wb = workbench(
            ScriptedBridge::default().reply("path", Ok("Path: 大门->教学楼->图书馆 | Total Distance: 300")),
        );
        let ctx = RequestContext::new(Intent::Compute(ServiceName::Path));

        let outcome = wb
            .shortest_path(&ctx, &"1".into(), &"2".into())
            .await
            .unwrap();

        let PathOutcome::Path(path) = outcome else {
            panic!("expected a path");
        };
        assert_eq!(path.hops(), vec!["大门", "教学楼", "图书馆"]);
        assert_eq!(path.total(), Some(300));
        assert_eq!(wb.bridge.seen.lock()[0].args, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_execution_error_surfaces_verbatim() {
        let wb = workbench(ScriptedBridge::default().reply("edges", Err(2)));
        let ctx = RequestContext::new(Intent::Compute(ServiceName::Edges));

        let err = wb.remote_edges(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            WorkbenchError::Bridge(BridgeError::Execution { exit_code: Some(2), .. })
        ));
    }

    #[tokio::test]
    async fn test_prose_from_table_services_is_kept() {
        let bridge = ScriptedBridge::default()
            .reply("locations", Ok("No locations available."))
            .reply("sort_id", Ok("No students to display.\n"))
            .reply("print_tree", Ok("Dictionary is empty."));
        let wb = workbench(bridge);
        let ctx = RequestContext::new(Intent::Compute(ServiceName::Locations));

        let locations = wb.remote_locations(&ctx).await.unwrap();
        assert_eq!(locations.raw(), Some("No locations available."));
        assert!(matches!(
            locations,
            ServiceOutput::Untyped { shape: BridgeResponse::Text(_), .. }
        ));

        let students = wb.sorted_students(&ctx, SortKey::Id).await.unwrap();
        assert_eq!(students.raw(), Some("No students to display."));

        let tree = wb.remote_tree(&ctx).await.unwrap();
        assert_eq!(tree.raw(), Some("Dictionary is empty."));
    }

    #[tokio::test]
    async fn test_unregistered_service_is_not_found() {
        let wb = workbench(ScriptedBridge::default());
        let ctx = RequestContext::new(Intent::Compute(ServiceName::Fuzzy));

        let err = wb.fuzzy(&ctx, "App").await.unwrap_err();
        assert!(matches!(err, WorkbenchError::Bridge(BridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_models_from_seed() {
        let wb = workbench(ScriptedBridge::default());
        let ctx = RequestContext::new(Intent::Visualize(Collection::Dictionary));

        let tree = wb.dictionary_tree(&ctx).await.unwrap();
        assert_eq!(tree.root(), Some("Apple"));
        assert_eq!(tree.len(), 7);

        let graph = wb.campus_graph(&ctx).await.unwrap();
        assert_eq!(graph.nodes.len(), 7);
        assert_eq!(graph.edges.len(), 9);
        assert_eq!(graph.synthesized().count(), 0);
    }

    #[tokio::test]
    async fn test_removed_location_becomes_placeholder() {
        let wb = workbench(ScriptedBridge::default());
        let ctx = RequestContext::new(Intent::Remove(Collection::Map));

        let outcome = wb.remove_location(&ctx, &"7".into()).await.unwrap();
        assert!(outcome.is_found());

        let graph = wb.campus_graph(&ctx).await.unwrap();
        let placeholder = graph.node(&"7".into()).unwrap();
        assert!(placeholder.synthesized);
        assert_eq!(placeholder.label, "7");
    }

    #[test]
    fn test_context_is_per_request() {
        let a = RequestContext::new(Intent::Browse(Collection::Students));
        let b = RequestContext::new(Intent::Browse(Collection::Students));
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.intent.to_string(), "browse:students");
        assert!(a.elapsed_ms() >= 0);
    }
}
