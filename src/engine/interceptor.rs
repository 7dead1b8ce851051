// Network Transfer Interceptor: observes byte progress of transfers the host
// subsystem performs itself, by wrapping the hub's transport for one batch.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::asset::AssetDescriptor;
use super::progress::ProgressAggregator;
use crate::error::TransportError;
use crate::transport::hub::{InterceptionScope, TransportHub};
use crate::transport::traits::{TransferListener, TransferOutcome, TransferRequest, Transport};

/// Decides whether a transfer target belongs to a tracked asset.
///
/// Matching is heuristic: a miss under-reports progress, a spurious hit
/// double-counts it.
pub trait RequestMatcher: Send + Sync {
    fn matches(&self, target: &str, asset: &AssetDescriptor) -> bool;
}

/// Matches when the target contains the asset's locator or its file name.
/// The host may rewrite locators, so exact equality would miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct LooseMatcher;

impl RequestMatcher for LooseMatcher {
    fn matches(&self, target: &str, asset: &AssetDescriptor) -> bool {
        if !asset.url.is_empty() && target.contains(asset.url.as_str()) {
            return true;
        }
        let file = asset.file_name();
        !file.is_empty() && target.contains(file)
    }
}

/// Set of observed transfers that have not reached their terminal event.
#[derive(Default)]
pub struct ActiveRequests {
    ids: Mutex<HashSet<u64>>,
    next_id: AtomicU64,
    idle: Notify,
}

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.ids.lock().insert(id);
        id
    }

    /// Returns `true` if `id` was still active.
    fn remove(&self, id: u64) -> bool {
        let (removed, now_empty) = {
            let mut ids = self.ids.lock();
            let removed = ids.remove(&id);
            (removed, ids.is_empty())
        };
        if removed && now_empty {
            self.idle.notify_waiters();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Wait until no observed transfer is in flight. Woken as soon as the set
    /// empties, and rechecked every `poll_interval` regardless.
    pub async fn wait_idle(&self, poll_interval: Duration) {
        loop {
            let notified = self.idle.notified();
            if self.is_empty() {
                return;
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
}

/// Retires its id when the send future finishes or is dropped.
struct ActiveGuard {
    active: Arc<ActiveRequests>,
    id: u64,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.remove(self.id);
    }
}

/// Per-transfer observer, alive from send until the terminal event.
struct InterceptedRequest {
    id: u64,
    asset_id: String,
    last_loaded: AtomicU64,
    progress: Arc<ProgressAggregator>,
    active: Arc<ActiveRequests>,
}

impl TransferListener for InterceptedRequest {
    fn on_progress(&self, loaded: u64, _total: Option<u64>) {
        let prev = self.last_loaded.fetch_max(loaded, Ordering::AcqRel);
        if loaded > prev {
            self.progress.add_bytes(loaded - prev);
        }
    }

    fn on_end(&self, outcome: TransferOutcome) {
        if self.active.remove(self.id) {
            debug!(
                "intercepted transfer for {} ended: {:?} after {} bytes",
                self.asset_id,
                outcome,
                self.last_loaded.load(Ordering::Acquire)
            );
        }
    }
}

/// Transport wrapper installed on the hub for the duration of one batch.
pub struct TransferInterceptor {
    inner: Arc<dyn Transport>,
    tracked: Arc<Vec<AssetDescriptor>>,
    matcher: Arc<dyn RequestMatcher>,
    progress: Arc<ProgressAggregator>,
    active: Arc<ActiveRequests>,
}

#[async_trait]
impl Transport for TransferInterceptor {
    fn open(&self, request: &mut TransferRequest, url: &str) {
        self.inner.open(request, url);
        if request.target().is_none() {
            request.set_target(url);
        }
    }

    async fn send(&self, mut request: TransferRequest) -> Result<Bytes> {
        let matched = request
            .target()
            .and_then(|t| self.tracked.iter().find(|a| self.matcher.matches(t, a)));

        let _guard = match matched {
            Some(asset) => {
                let id = self.active.insert();
                debug!(
                    "intercepting transfer {} for asset {} ({:?})",
                    id,
                    asset.id,
                    request.target()
                );
                request.subscribe(Arc::new(InterceptedRequest {
                    id,
                    asset_id: asset.id.clone(),
                    last_loaded: AtomicU64::new(0),
                    progress: Arc::clone(&self.progress),
                    active: Arc::clone(&self.active),
                }));
                Some(ActiveGuard {
                    active: Arc::clone(&self.active),
                    id,
                })
            }
            None => None,
        };

        self.inner.send(request).await
    }
}

/// An installed interceptor. Restores the hub when restored or dropped.
pub struct Interception {
    scope: InterceptionScope,
    active: Arc<ActiveRequests>,
}

impl Interception {
    pub fn install(
        hub: &Arc<TransportHub>,
        tracked: Vec<AssetDescriptor>,
        matcher: Arc<dyn RequestMatcher>,
        progress: Arc<ProgressAggregator>,
    ) -> Result<Self, TransportError> {
        let active = Arc::new(ActiveRequests::new());
        let tracked = Arc::new(tracked);
        let wrap_active = Arc::clone(&active);
        let scope = hub.intercept(move |inner| {
            Arc::new(TransferInterceptor {
                inner,
                tracked,
                matcher,
                progress,
                active: wrap_active,
            }) as Arc<dyn Transport>
        })?;
        Ok(Self { scope, active })
    }

    pub fn active(&self) -> &Arc<ActiveRequests> {
        &self.active
    }

    pub fn restore(self) {
        self.scope.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::asset::AssetKind;

    /// Reports a fixed sequence of cumulative counters, then completes.
    struct Scripted {
        steps: Vec<u64>,
    }

    #[async_trait]
    impl Transport for Scripted {
        fn open(&self, request: &mut TransferRequest, url: &str) {
            request.set_target(url);
        }

        async fn send(&self, request: TransferRequest) -> Result<Bytes> {
            for loaded in &self.steps {
                request.notify_progress(*loaded, None);
            }
            request.notify_end(TransferOutcome::Completed);
            Ok(Bytes::new())
        }
    }

    /// Reports some progress, then fails. `announce` controls whether the
    /// failure is signalled to listeners before the error is returned.
    struct Failing {
        announce: bool,
    }

    #[async_trait]
    impl Transport for Failing {
        fn open(&self, request: &mut TransferRequest, url: &str) {
            request.set_target(url);
        }

        async fn send(&self, request: TransferRequest) -> Result<Bytes> {
            request.notify_progress(40, Some(100));
            if self.announce {
                request.notify_end(TransferOutcome::Failed);
            }
            Err(anyhow::anyhow!("transfer failed: HTTP 404"))
        }
    }

    fn splat() -> AssetDescriptor {
        AssetDescriptor::new("Complex", AssetKind::Splat, "assets/gsplats/Complex.sog")
    }

    #[test]
    fn test_loose_matcher() {
        let asset = splat();
        let m = LooseMatcher;
        assert!(m.matches("http://cdn/assets/gsplats/Complex.sog", &asset));
        assert!(m.matches("blob:http://cdn/Complex.sog?t=1", &asset));
        assert!(!m.matches("http://cdn/assets/other.sog", &asset));
    }

    #[tokio::test]
    async fn test_deltas_from_cumulative_counters() {
        let base: Arc<dyn Transport> = Arc::new(Scripted {
            steps: vec![100, 300, 300, 250, 1000],
        });
        let hub = TransportHub::new(base.clone());
        let progress = Arc::new(ProgressAggregator::new(2000, None));

        let interception =
            Interception::install(&hub, vec![splat()], Arc::new(LooseMatcher), progress.clone())
                .unwrap();
        hub.fetch("http://cdn/assets/gsplats/Complex.sog").await.unwrap();
        // Untracked transfers pass through unobserved.
        hub.fetch("http://cdn/unrelated.bin").await.unwrap();

        assert_eq!(progress.loaded_bytes(), 1000);
        assert!(interception.active().is_empty());
        interception.restore();
        assert!(Arc::ptr_eq(&hub.current(), &base));
    }

    #[tokio::test]
    async fn test_failed_transfers_are_retired() {
        for announce in [true, false] {
            let hub = TransportHub::new(Arc::new(Failing { announce }));
            let progress = Arc::new(ProgressAggregator::new(1000, None));
            let interception =
                Interception::install(&hub, vec![splat()], Arc::new(LooseMatcher), progress.clone())
                    .unwrap();

            let err = hub
                .fetch("http://cdn/assets/gsplats/Complex.sog")
                .await
                .unwrap_err();
            assert!(err.to_string().contains("404"));
            assert!(interception.active().is_empty());
            assert_eq!(progress.loaded_bytes(), 40);

            interception.restore();
            assert!(!hub.is_intercepted());
        }
    }

    #[tokio::test]
    async fn test_wait_idle_wakes_on_last_removal() {
        let active = Arc::new(ActiveRequests::new());
        let a = active.insert();
        let b = active.insert();
        assert_eq!(active.len(), 2);

        let remover = active.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remover.remove(a);
            remover.remove(b);
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            active.wait_idle(Duration::from_secs(60)),
        )
        .await
        .expect("drain wait should be woken by the final removal");
        assert!(active.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let active = ActiveRequests::new();
        let id = active.insert();
        assert!(active.remove(id));
        assert!(!active.remove(id));
    }
}
