// Asset Load Orchestrator: fans out one load per asset, aggregates byte
// progress across both load paths, and signals completion once everything
// (including observed host transfers) has settled.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::asset::{total_estimated_bytes, AssetDescriptor, AssetLoadTask, AssetState, LoadPath};
use super::host::{wait_for_load, AssetHost};
use super::interceptor::{Interception, LooseMatcher, RequestMatcher};
use super::progress::{ProgressAggregator, ProgressCallback};
use super::reader::read_with_progress;
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::source::traits::HttpFetch;
use crate::transport::hub::TransportHub;

/// Invoked once when a batch has fully settled.
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Outcome of one batch. Failed assets do not fail the batch.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub total_bytes: u64,
    pub observed_bytes: u64,
}

impl LoadReport {
    pub fn asset_count(&self) -> usize {
        self.loaded.len() + self.failed.len()
    }
}

pub struct AssetLoader {
    host: Arc<dyn AssetHost>,
    source: Arc<dyn HttpFetch>,
    hub: Arc<TransportHub>,
    matcher: Arc<dyn RequestMatcher>,
    config: LoaderConfig,
}

impl AssetLoader {
    pub fn new(
        host: Arc<dyn AssetHost>,
        source: Arc<dyn HttpFetch>,
        hub: Arc<TransportHub>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            host,
            source,
            hub,
            matcher: Arc::new(LooseMatcher),
            config,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn RequestMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Load every asset concurrently and fire `on_complete` after all of them
    /// reached a terminal state and observed transfers have drained.
    ///
    /// Only fails up front, when another batch holds the transport hub.
    pub async fn load_all(
        &self,
        assets: Vec<AssetDescriptor>,
        on_progress: Option<ProgressCallback>,
        on_complete: Option<CompletionCallback>,
    ) -> Result<LoadReport, LoadError> {
        let t0 = Instant::now();
        let observe = self.config.intercept_host_transfers;
        let total_bytes = total_estimated_bytes(&assets, observe);
        let progress = Arc::new(ProgressAggregator::new(total_bytes, on_progress));

        let interception = if observe {
            let tracked: Vec<AssetDescriptor> = assets
                .iter()
                .filter(|a| a.kind.load_path() == LoadPath::HostManaged)
                .cloned()
                .collect();
            Some(Interception::install(
                &self.hub,
                tracked,
                Arc::clone(&self.matcher),
                Arc::clone(&progress),
            )?)
        } else {
            None
        };

        info!(
            "loading {} assets, estimated {} bytes, intercept={}",
            assets.len(),
            total_bytes,
            observe
        );

        let tasks = join_all(
            assets
                .into_iter()
                .map(|asset| self.run_task(AssetLoadTask::new(asset), &progress)),
        )
        .await;

        if let Some(interception) = interception {
            let active = Arc::clone(interception.active());
            let drain = active.wait_idle(self.config.drain_poll_interval());
            if tokio::time::timeout(self.config.drain_timeout(), drain)
                .await
                .is_err()
            {
                warn!(
                    "drain wait timed out with {} transfers still active",
                    active.len()
                );
            }
            interception.restore();
        }

        progress.finish();

        let mut report = LoadReport {
            total_bytes,
            observed_bytes: progress.loaded_bytes(),
            ..LoadReport::default()
        };
        for task in tasks {
            match task.state() {
                AssetState::Loaded => report.loaded.push(task.descriptor.id),
                _ => {
                    let reason = task.error().unwrap_or("unknown").to_string();
                    report.failed.push((task.descriptor.id, reason));
                }
            }
        }

        info!(
            "asset batch settled: loaded={} failed={} observed_bytes={} elapsed_ms={}",
            report.loaded.len(),
            report.failed.len(),
            report.observed_bytes,
            t0.elapsed().as_millis()
        );

        if let Some(done) = on_complete {
            done();
        }
        Ok(report)
    }

    async fn run_task(
        &self,
        mut task: AssetLoadTask,
        progress: &Arc<ProgressAggregator>,
    ) -> AssetLoadTask {
        task.start();
        let asset = &task.descriptor;
        let outcome = match asset.kind.load_path() {
            LoadPath::Streamed => self.load_streamed(asset, progress).await,
            LoadPath::HostManaged => self.load_in_host(asset, None).await,
        };

        match outcome {
            Ok(()) => {
                debug!("asset {} loaded", task.descriptor.display_name());
                task.complete();
            }
            Err(e) => {
                warn!(
                    "asset {} ({}) failed to load: {:#}",
                    task.descriptor.display_name(),
                    task.descriptor.kind,
                    e
                );
                task.fail(format!("{:#}", e));
            }
        }
        task
    }

    async fn load_streamed(
        &self,
        asset: &AssetDescriptor,
        progress: &Arc<ProgressAggregator>,
    ) -> Result<()> {
        let payload = read_with_progress(
            self.source.as_ref(),
            &asset.url,
            asset.hint_bytes(),
            |delta| {
                progress.add_bytes(delta);
            },
        )
        .await?;
        self.load_in_host(asset, Some(payload)).await
    }

    async fn load_in_host(
        &self,
        asset: &AssetDescriptor,
        payload: Option<Bytes>,
    ) -> Result<()> {
        if !self.host.is_registered(&asset.id) {
            self.host.register(asset);
        }
        wait_for_load(self.host.load(asset, payload)).await
    }
}
