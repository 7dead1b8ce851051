// Prewarm Cache Manager: discover the tile images of a splat manifest and
// make sure each one is in the persistent cache before it is needed.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use bytes::Bytes;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info};

use super::cache::CacheStore;
use super::progress::{ProgressAggregator, ProgressCallback};
use crate::config::PrewarmConfig;
use crate::error::PrewarmError;
use crate::source::traits::HttpFetch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrewarmReport {
    pub total: usize,
    pub hits: usize,
    pub stored: usize,
    pub skipped: usize,
}

enum TileOutcome {
    Hit,
    Stored,
    Unavailable(u16),
}

/// Directory part of a manifest locator, including the trailing slash.
pub fn manifest_base(manifest_url: &str) -> &str {
    match manifest_url.rfind('/') {
        Some(idx) => &manifest_url[..=idx],
        None => "",
    }
}

/// Resolve a tile name against the manifest's directory.
pub fn resolve_tile_url(base: &str, name: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(name)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base, name),
    }
}

/// Collect every string in `value` ending with `extension`, at any depth.
pub fn collect_tile_names<'a>(value: &'a Value, extension: &str, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) if s.ends_with(extension) => out.push(s),
        Value::Array(items) => {
            for item in items {
                collect_tile_names(item, extension, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_tile_names(item, extension, out);
            }
        }
        _ => {}
    }
}

/// Tile URLs named by the manifest plus the well-known tile set, deduplicated.
pub fn discover_tile_urls(
    manifest_url: &str,
    manifest: &Value,
    config: &PrewarmConfig,
) -> BTreeSet<String> {
    let base = manifest_base(manifest_url);
    let mut names = Vec::new();
    collect_tile_names(manifest, &config.tile_extension, &mut names);

    names
        .into_iter()
        .chain(config.well_known_tiles.iter().map(String::as_str))
        .map(|name| resolve_tile_url(base, name))
        .collect()
}

pub struct TilePrewarmer {
    source: Arc<dyn HttpFetch>,
    store: Arc<dyn CacheStore>,
    config: PrewarmConfig,
}

impl TilePrewarmer {
    pub fn new(
        source: Arc<dyn HttpFetch>,
        store: Arc<dyn CacheStore>,
        config: PrewarmConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Ensure every tile of the manifest is cached.
    ///
    /// Only a manifest that cannot be fetched or parsed is an error. Tile
    /// failures are skipped; `on_progress` advances once per tile either way.
    pub async fn prewarm(
        &self,
        manifest_url: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PrewarmReport, PrewarmError> {
        let t0 = Instant::now();
        let manifest = self.fetch_manifest(manifest_url).await?;
        let urls = discover_tile_urls(manifest_url, &manifest, &self.config);

        let mut report = PrewarmReport {
            total: urls.len(),
            ..PrewarmReport::default()
        };
        if urls.is_empty() {
            debug!("manifest {} names no tiles", manifest_url);
            return Ok(report);
        }

        // One unit per tile.
        let progress = ProgressAggregator::new(urls.len() as u64, on_progress);
        for url in &urls {
            match self.warm_tile(url).await {
                Ok(TileOutcome::Hit) => report.hits += 1,
                Ok(TileOutcome::Stored) => report.stored += 1,
                Ok(TileOutcome::Unavailable(status)) => {
                    debug!("tile {} skipped: HTTP {}", url, status);
                    report.skipped += 1;
                }
                Err(e) => {
                    debug!("tile {} skipped: {:#}", url, e);
                    report.skipped += 1;
                }
            }
            progress.add_bytes(1);
        }

        info!(
            "prewarmed {} tiles from {}: hits={} stored={} skipped={} elapsed_ms={}",
            report.total,
            manifest_url,
            report.hits,
            report.stored,
            report.skipped,
            t0.elapsed().as_millis()
        );
        Ok(report)
    }

    async fn fetch_manifest(&self, manifest_url: &str) -> Result<Value, PrewarmError> {
        let fetch_err = |source: anyhow::Error| PrewarmError::ManifestFetch {
            url: manifest_url.to_string(),
            source,
        };

        let resp = self.source.get(manifest_url).await.map_err(fetch_err)?;
        if !resp.is_success() {
            return Err(PrewarmError::ManifestStatus {
                url: manifest_url.to_string(),
                status: resp.status,
            });
        }
        let body = resp.body.collect().await.map_err(fetch_err)?;
        serde_json::from_slice(&body).map_err(|source| PrewarmError::ManifestParse {
            url: manifest_url.to_string(),
            source,
        })
    }

    async fn warm_tile(&self, url: &str) -> Result<TileOutcome> {
        if self.store.contains(url).await? {
            return Ok(TileOutcome::Hit);
        }
        let resp = self.source.get(url).await?;
        if !resp.is_success() {
            return Ok(TileOutcome::Unavailable(resp.status));
        }
        let body: Bytes = resp.body.collect().await?;
        self.store.put(url, body).await?;
        Ok(TileOutcome::Stored)
    }
}
