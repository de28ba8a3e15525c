//! Visualization models built from stored records.
//!
//! Both builders are pure and read-only: the same ordered input always
//! yields the same structure, and neither carries any search or pathfinding
//! logic.
//!
//! ```text
//! dictionary records ──► SearchTree ──► (parent, child, side) links
//! map records        ──► GraphModel ──► labeled nodes + weighted edges
//! ```

pub mod tree;
pub mod graph;
pub mod fingerprint;

pub use tree::{SearchTree, Side, TreeLink};
pub use graph::{GraphEdge, GraphModel, GraphNode};
pub use fingerprint::fingerprint;
