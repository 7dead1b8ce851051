// Process-wide transport slot and the single-owner interception scope.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use super::http_transport::HttpTransport;
use super::traits::{TransferRequest, Transport};
use crate::error::TransportError;
use crate::source::http_source::HttpSource;

struct HubState {
    current: Arc<dyn Transport>,
    /// The transport displaced by the active scope, if any.
    original: Option<Arc<dyn Transport>>,
}

/// Shared slot holding the transport every host subsystem fetches through.
///
/// At most one [`InterceptionScope`] may be installed at a time. Dropping the
/// scope puts the displaced transport back, so the slot is restored on every
/// exit path including unwinding.
pub struct TransportHub {
    state: RwLock<HubState>,
}

static GLOBAL_HUB: OnceLock<Arc<TransportHub>> = OnceLock::new();

impl TransportHub {
    pub fn new(base: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(HubState {
                current: base,
                original: None,
            }),
        })
    }

    /// The process-wide hub, backed by a plain [`HttpSource`].
    pub fn global() -> Arc<Self> {
        GLOBAL_HUB
            .get_or_init(|| {
                let source = Arc::new(HttpSource::default());
                Self::new(Arc::new(HttpTransport::new(source)))
            })
            .clone()
    }

    pub fn current(&self) -> Arc<dyn Transport> {
        self.state.read().current.clone()
    }

    pub fn is_intercepted(&self) -> bool {
        self.state.read().original.is_some()
    }

    /// Open and send one transfer through the current transport.
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        let transport = self.current();
        let mut request = TransferRequest::new();
        transport.open(&mut request, url);
        transport.send(request).await
    }

    /// Replace the current transport with `wrap(current)` until the returned
    /// scope is restored or dropped.
    pub fn intercept<F>(self: &Arc<Self>, wrap: F) -> Result<InterceptionScope, TransportError>
    where
        F: FnOnce(Arc<dyn Transport>) -> Arc<dyn Transport>,
    {
        let mut state = self.state.write();
        if state.original.is_some() {
            return Err(TransportError::ScopeActive);
        }
        let original = state.current.clone();
        state.current = wrap(original.clone());
        state.original = Some(original);
        debug!("transport interception installed");

        Ok(InterceptionScope {
            hub: Arc::clone(self),
            released: false,
        })
    }

    fn release(&self) {
        let mut state = self.state.write();
        if let Some(original) = state.original.take() {
            state.current = original;
            debug!("transport interception restored");
        }
    }
}

/// Guard for an installed interception. Restores the hub when dropped.
#[must_use = "dropping the scope restores the transport immediately"]
pub struct InterceptionScope {
    hub: Arc<TransportHub>,
    released: bool,
}

impl InterceptionScope {
    pub fn restore(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.hub.release();
        }
    }
}

impl Drop for InterceptionScope {
    fn drop(&mut self) {
        self.release();
    }
}
