//! Configuration for the sync and caching engine.
//!
//! # Example
//!
//! ```
//! use tagsync::SyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.namespace, "tagsync");
//!
//! // Full config
//! let config = SyncConfig {
//!     stale_time_ms: Some(30_000),
//!     sync_interval_ms: 60_000,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the sync engine and cache controller.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Key prefix for everything the engine persists locally.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Age in milliseconds before a cached query result is considered stale.
    /// `None` means never expire.
    #[serde(default)]
    pub stale_time_ms: Option<u64>,

    /// Window suppressing repeat background revalidations of the same key.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound on each remote pull/push call; exceeding it fails the cycle.
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Interval between background sync cycles.
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
}

fn default_namespace() -> String {
    "tagsync".to_string()
}
fn default_debounce_ms() -> u64 {
    2_000
}
fn default_remote_timeout_ms() -> u64 {
    15_000
}
fn default_sync_interval_ms() -> u64 {
    60_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            stale_time_ms: None,
            debounce_ms: default_debounce_ms(),
            remote_timeout_ms: default_remote_timeout_ms(),
            sync_interval_ms: default_sync_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.namespace, "tagsync");
        assert!(config.stale_time_ms.is_none());
        assert_eq!(config.debounce_ms, 2_000);
        assert_eq!(config.remote_timeout_ms, 15_000);
        assert_eq!(config.sync_interval_ms, 60_000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"stale_time_ms": 5000, "namespace": "ext"}"#).unwrap();
        assert_eq!(config.namespace, "ext");
        assert_eq!(config.stale_time_ms, Some(5000));
        assert_eq!(config.debounce_ms, 2_000);
    }
}
