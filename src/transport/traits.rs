use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Terminal state of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    Failed,
}

/// Native notifications of a single transfer.
///
/// `on_progress` receives cumulative byte counts. `on_end` fires exactly once.
pub trait TransferListener: Send + Sync {
    fn on_progress(&self, loaded: u64, total: Option<u64>);
    fn on_end(&self, outcome: TransferOutcome);
}

/// Handle for one transfer, created empty and targeted by [`Transport::open`].
#[derive(Default)]
pub struct TransferRequest {
    target: Option<String>,
    listeners: Vec<Arc<dyn TransferListener>>,
}

impl TransferRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn set_target(&mut self, url: &str) {
        self.target = Some(url.to_string());
    }

    pub fn subscribe(&mut self, listener: Arc<dyn TransferListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify_progress(&self, loaded: u64, total: Option<u64>) {
        for l in &self.listeners {
            l.on_progress(loaded, total);
        }
    }

    pub fn notify_end(&self, outcome: TransferOutcome) {
        for l in &self.listeners {
            l.on_end(outcome);
        }
    }
}

impl fmt::Debug for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRequest")
            .field("target", &self.target)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// The low-level transfer primitive host subsystems fetch through.
///
/// A transfer is initiated with `open` and performed with `send`, which must
/// notify the request's listeners with progress and one terminal event.
#[async_trait]
pub trait Transport: Send + Sync {
    fn open(&self, request: &mut TransferRequest, url: &str);
    async fn send(&self, request: TransferRequest) -> Result<Bytes>;
}
