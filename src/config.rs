//! Workbench configuration.
//!
//! ## Environment
//!
//! - `WORKBENCH_DATA_DIR`, `WORKBENCH_*_FILE`: see [`FileStoreConfig`]
//! - `WORKBENCH_BIN_DIR`, `WORKBENCH_BRIDGE_TIMEOUT_SECS`: see [`BridgeConfig`]
//! - `WORKBENCH_DUPLICATE_KEYS`: `reject` (default) or `allow`

use crate::bridge::BridgeConfig;
use crate::store::{DuplicatePolicy, FileStoreConfig};

/// Complete workbench configuration.
#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    /// Document locations.
    pub store: FileStoreConfig,
    /// Computation service settings.
    pub bridge: BridgeConfig,
    /// Key uniqueness policy on append.
    pub duplicates: DuplicatePolicy,
}

impl WorkbenchConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let duplicates = match std::env::var("WORKBENCH_DUPLICATE_KEYS") {
            Ok(raw) => DuplicatePolicy::from_str(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Unknown WORKBENCH_DUPLICATE_KEYS, using reject");
                DuplicatePolicy::Reject
            }),
            Err(_) => DuplicatePolicy::default(),
        };

        Self {
            store: FileStoreConfig::from_env(),
            bridge: BridgeConfig::from_env(),
            duplicates,
        }
    }
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_names() {
        assert_eq!(DuplicatePolicy::from_str("ALLOW"), Some(DuplicatePolicy::Allow));
        assert_eq!(DuplicatePolicy::from_str("reject"), Some(DuplicatePolicy::Reject));
        assert_eq!(DuplicatePolicy::from_str("sometimes"), None);
    }
}
