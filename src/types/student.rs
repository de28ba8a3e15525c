//! Student grade records.

use serde::{Deserialize, Serialize};

/// A student with a numeric score. Keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    /// Student number.
    pub id: String,
    /// Display name (single token).
    pub name: String,
    /// Decimal score.
    pub score: f64,
}

impl StudentRecord {
    /// Create a new student record.
    pub fn new(id: impl Into<String>, name: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score,
        }
    }
}
