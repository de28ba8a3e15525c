//! Dictionary entries.

use serde::{Deserialize, Serialize};

/// A word and its meaning. Keyed by `word`, case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// The headword.
    pub word: String,
    /// Free-text meaning; may contain colons.
    pub meaning: String,
}

impl DictionaryEntry {
    /// Create a new dictionary entry.
    pub fn new(word: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            meaning: meaning.into(),
        }
    }
}
