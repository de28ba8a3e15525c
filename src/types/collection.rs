//! Collection identifiers and the tagged record variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DictionaryEntry, Edge, Location, StudentRecord};

/// One independently persisted record collection.
///
/// Ordering is declaration order, so maps keyed by `Collection` iterate
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Collection {
    /// Student grade records.
    Students,
    /// Word dictionary entries.
    Dictionary,
    /// Campus map: locations and edges in one sectioned document.
    Map,
}

impl Collection {
    /// All collections, in canonical order.
    pub const ALL: [Collection; 3] = [Self::Students, Self::Dictionary, Self::Map];

    /// Parse a collection name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "students" | "student" => Some(Self::Students),
            "dictionary" | "dict" => Some(Self::Dictionary),
            "map" | "campus" => Some(Self::Map),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Students => write!(f, "students"),
            Self::Dictionary => write!(f, "dictionary"),
            Self::Map => write!(f, "map"),
        }
    }
}

/// A record of any collection.
///
/// Each variant has exactly one line grammar; the owning collection is
/// implied by the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// A student record.
    Student(StudentRecord),
    /// A dictionary entry.
    Entry(DictionaryEntry),
    /// A map location.
    Location(Location),
    /// A map edge.
    Edge(Edge),
}

impl Record {
    /// The collection this record is persisted in.
    pub fn collection(&self) -> Collection {
        match self {
            Self::Student(_) => Collection::Students,
            Self::Entry(_) => Collection::Dictionary,
            Self::Location(_) | Self::Edge(_) => Collection::Map,
        }
    }

    /// The record key, if the record kind is keyed.
    ///
    /// Edges carry no key.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Student(s) => Some(&s.id),
            Self::Entry(e) => Some(&e.word),
            Self::Location(l) => Some(l.id.as_str()),
            Self::Edge(_) => None,
        }
    }
}

impl From<StudentRecord> for Record {
    fn from(r: StudentRecord) -> Self {
        Self::Student(r)
    }
}

impl From<DictionaryEntry> for Record {
    fn from(r: DictionaryEntry) -> Self {
        Self::Entry(r)
    }
}

impl From<Location> for Record {
    fn from(r: Location) -> Self {
        Self::Location(r)
    }
}

impl From<Edge> for Record {
    fn from(r: Edge) -> Self {
        Self::Edge(r)
    }
}
