use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Interval at which the drain wait rechecks the active transfer set.
pub const DRAIN_POLL_INTERVAL_MS: u64 = 100;

/// Upper bound on the drain wait before a batch completes anyway.
pub const DRAIN_TIMEOUT_MS: u64 = 30_000;

/// Ceiling on buffer space reserved up front from a size hint or
/// Content-Length; larger bodies grow the buffer as chunks arrive.
pub const MAX_PREALLOC_BYTES: u64 = 8 * 1024 * 1024;

/// Tracing directive used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Name of the persistent store tile prewarming writes into.
pub const PREWARM_CACHE_NAME: &str = "sogs-prewarm-v1";

/// File extension that marks a manifest string as a tile image.
pub const TILE_EXTENSION: &str = ".webp";

/// Tiles every splat manifest carries, whether or not it lists them.
pub const WELL_KNOWN_TILES: &[&str] = &[
    "means_l.webp",
    "means_u.webp",
    "quats.webp",
    "scales.webp",
    "sh0.webp",
    "shN_centroids.webp",
    "shN_labels.webp",
];

/// Configuration for a batch asset load.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub drain_poll_interval_ms: u64,
    pub drain_timeout_ms: u64,
    /// Observe transfers made by the host subsystem itself.
    pub intercept_host_transfers: bool,
    /// Extra headers sent with every GET.
    pub headers: HashMap<String, String>,
    /// `EnvFilter` directive for [`crate::init_logging`].
    pub log_filter: String,
    pub prewarm: PrewarmConfig,
}

impl LoaderConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| anyhow!("invalid loader config: {}", e))
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms.max(1))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            drain_poll_interval_ms: DRAIN_POLL_INTERVAL_MS,
            drain_timeout_ms: DRAIN_TIMEOUT_MS,
            intercept_host_transfers: true,
            headers: HashMap::new(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            prewarm: PrewarmConfig::default(),
        }
    }
}

/// Configuration for tile cache prewarming.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrewarmConfig {
    pub cache_name: String,
    pub tile_extension: String,
    pub well_known_tiles: Vec<String>,
}

impl Default for PrewarmConfig {
    fn default() -> Self {
        Self {
            cache_name: PREWARM_CACHE_NAME.to_string(),
            tile_extension: TILE_EXTENSION.to_string(),
            well_known_tiles: WELL_KNOWN_TILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = LoaderConfig::from_json_str(
            r#"{"drain_timeout_ms": 500, "prewarm": {"well_known_tiles": []}}"#,
        )
        .unwrap();
        assert_eq!(cfg.drain_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.drain_poll_interval_ms, DRAIN_POLL_INTERVAL_MS);
        assert!(cfg.intercept_host_transfers);
        assert!(cfg.prewarm.well_known_tiles.is_empty());
        assert_eq!(cfg.prewarm.cache_name, PREWARM_CACHE_NAME);
    }

    #[test]
    fn test_log_filter_configurable() {
        assert_eq!(LoaderConfig::default().log_filter, DEFAULT_LOG_FILTER);
        let cfg = LoaderConfig::from_json_str(r#"{"log_filter": "debug"}"#).unwrap();
        assert_eq!(cfg.log_filter, "debug");
        assert_eq!(cfg.drain_timeout_ms, DRAIN_TIMEOUT_MS);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(LoaderConfig::from_json_str("{not json").is_err());
    }
}
