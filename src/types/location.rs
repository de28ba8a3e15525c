//! Campus map records: locations and weighted edges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a location on the campus map.
///
/// Ids are opaque tokens; `"10"` and `"010"` are different ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    /// Create a location id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LocationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A named place on the map. Keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Location id.
    pub id: LocationId,
    /// Popularity score (0-100 by convention, not enforced).
    pub popularity: i64,
    /// Display name (single token).
    pub name: String,
    /// Free-text description; may be empty and may contain spaces.
    pub info: String,
}

impl Location {
    /// Create a new location.
    pub fn new(
        id: impl Into<LocationId>,
        popularity: i64,
        name: impl Into<String>,
        info: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            popularity,
            name: name.into(),
            info: info.into(),
        }
    }
}

/// A weighted connection between two locations.
///
/// Undirected by convention. Parallel edges are permitted and endpoints are
/// not checked against the location set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// One endpoint.
    pub from: LocationId,
    /// Other endpoint.
    pub to: LocationId,
    /// Distance.
    pub weight: i64,
}

impl Edge {
    /// Create a new edge.
    pub fn new(from: impl Into<LocationId>, to: impl Into<LocationId>, weight: i64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            weight,
        }
    }

    /// Whether this edge joins `a` and `b`, in either direction.
    pub fn connects(&self, a: &LocationId, b: &LocationId) -> bool {
        (&self.from == a && &self.to == b) || (&self.from == b && &self.to == a)
    }
}

/// A parsed map record, tagged by section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapRecord {
    /// Record from the `LOCATIONS` section.
    Location(Location),
    /// Record from the `EDGES` section.
    Edge(Edge),
}
