//! Adjacency model of the campus map for rendering.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::fingerprint::fingerprint;
use crate::store::MapContents;
use crate::types::{Edge, Location, LocationId};

/// A renderable node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    /// Location id.
    pub id: LocationId,
    /// Display label: `name (popularity)`, or the bare id for placeholders.
    pub label: String,
    /// Popularity, when the location record exists.
    pub popularity: Option<i64>,
    /// Whether this node stands in for an id no location record defines.
    pub synthesized: bool,
}

impl GraphNode {
    fn from_location(location: &Location) -> Self {
        Self {
            id: location.id.clone(),
            label: format!("{} ({})", location.name, location.popularity),
            popularity: Some(location.popularity),
            synthesized: false,
        }
    }

    fn placeholder(id: &LocationId) -> Self {
        Self {
            id: id.clone(),
            label: id.to_string(),
            popularity: None,
            synthesized: true,
        }
    }
}

/// A renderable weighted edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// One endpoint.
    pub from: LocationId,
    /// Other endpoint.
    pub to: LocationId,
    /// Distance.
    pub weight: i64,
    /// Display label (the weight).
    pub label: String,
}

/// Nodes and weighted edges of the map.
///
/// ## Build rules
///
/// - Nodes keep location order; the first record with a given id wins.
/// - Every edge is kept, parallel edges included.
/// - An edge endpoint with no location record gets a synthesized placeholder
///   node labeled by the bare id, appended after the real nodes in
///   first-seen order. No user data is dropped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphModel {
    /// Nodes in build order.
    pub nodes: Vec<GraphNode>,
    /// Edges in store order.
    pub edges: Vec<GraphEdge>,
    #[serde(skip)]
    index: BTreeMap<LocationId, usize>,
}

impl GraphModel {
    /// Build the model from locations and edges.
    pub fn build(locations: &[Location], edges: &[Edge]) -> Self {
        let mut model = Self::default();

        for location in locations {
            if model.index.contains_key(&location.id) {
                warn!(id = %location.id, "Duplicate location id skipped in graph build");
                continue;
            }
            model.add_node(GraphNode::from_location(location));
        }

        for edge in edges {
            for endpoint in [&edge.from, &edge.to] {
                if !model.index.contains_key(endpoint) {
                    debug!(id = %endpoint, "Synthesizing placeholder node for dangling edge");
                    model.add_node(GraphNode::placeholder(endpoint));
                }
            }
            model.edges.push(GraphEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
                weight: edge.weight,
                label: edge.weight.to_string(),
            });
        }

        model
    }

    /// Build the model from parsed map contents.
    pub fn from_contents(contents: &MapContents) -> Self {
        Self::build(&contents.locations, &contents.edges)
    }

    fn add_node(&mut self, node: GraphNode) {
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Look up a node by id.
    pub fn node(&self, id: &LocationId) -> Option<&GraphNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Placeholder nodes, in build order.
    pub fn synthesized(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.synthesized)
    }

    /// Neighbors of a node with edge weights, treating edges as undirected.
    ///
    /// Parallel edges yield one entry each.
    pub fn neighbors(&self, id: &LocationId) -> Vec<(&LocationId, i64)> {
        self.edges
            .iter()
            .filter_map(|e| {
                if &e.from == id {
                    Some((&e.to, e.weight))
                } else if &e.to == id {
                    Some((&e.from, e.weight))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Stable fingerprint of nodes and edges.
    pub fn fingerprint(&self) -> String {
        fingerprint(&(&self.nodes, &self.edges))
    }
}
