//! # coursework-kernel
//!
//! Storage, computation bridge and visualization models for a three-topic
//! coursework workbench: a student roster, a bilingual dictionary and a
//! weighted campus map.
//!
//! ## Core Contract
//!
//! 1. Each collection lives in one line-oriented text document; records are
//!    appended as single lines and removed by exact key match plus rewrite
//! 2. Heavy computation (sorting, search, shortest path) runs in external
//!    programs invoked per call; their stdout is the result
//! 3. Tree and graph models are built deterministically from stored records
//!
//! ## Architecture
//!
//! ```text
//! user action → RequestContext → Workbench ─┬─► SegmentedStore ─► TextBackend (file or memory)
//!                                           ├─► ComputationBridge ─► child process
//!                                           └─► SearchTree / GraphModel
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same dictionary order → identical tree links and fingerprint
//! - Same map records → identical graph nodes, edges and fingerprint
//! - Deletion removes exactly the lines whose key token equals the key

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod format;
pub mod seed;
pub mod store;
pub mod builder;
pub mod bridge;
pub mod orchestrator;
pub mod config;

// Re-exports
pub use types::{
    Collection, DictionaryEntry, Edge, Location, LocationId, MapRecord, Record, StudentRecord,
};
pub use format::{FieldError, ParseReport, SkipReason, SkippedLine, EDGES_MARKER, LOCATIONS_MARKER};
pub use store::{
    DeleteOutcome, DuplicatePolicy, FileBackend, FileStoreConfig, InMemoryBackend, MapContents,
    SegmentedStore, StoreError, TextBackend,
};
pub use builder::{GraphEdge, GraphModel, GraphNode, SearchTree, Side, TreeLink};
pub use bridge::{
    BridgeConfig, BridgeError, BridgeRequest, BridgeResponse, ComputationBridge, CsvTable,
    OutlineTree, PathOutcome, PathResponse, ProcessBridge, ResponseError, SearchResult,
    ServiceName, ServiceOutput, ServiceRegistry,
};
pub use orchestrator::{Intent, RequestContext, SortKey, Workbench, WorkbenchError};
pub use config::WorkbenchConfig;
