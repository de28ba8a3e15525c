//! Shape fingerprints for the visualization models.
//!
//! A fingerprint is the xxh64 of the model's JSON form, so it changes with
//! any label, link or ordering change. Only ordered data (`Vec`, `BTreeMap`,
//! structs) may feed it.

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Hex xxh64 of a model's JSON encoding.
pub fn fingerprint<T: Serialize>(model: &T) -> String {
    let bytes = serde_json::to_vec(model).expect("model types serialize to JSON");
    format!("{:016x}", xxh64(&bytes, 0))
}
