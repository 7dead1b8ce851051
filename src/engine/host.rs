// Seam to the host application's asset subsystem.

use anyhow::{anyhow, Result};
use bytes::Bytes;
use tokio::sync::oneshot;

use super::asset::AssetDescriptor;

/// Single-resolution completion notification for one asset load.
pub type LoadSignal = oneshot::Receiver<Result<()>>;

/// Sending half of a [`LoadSignal`]. Consumed by the first notification.
pub struct LoadNotifier {
    tx: oneshot::Sender<Result<()>>,
}

impl LoadNotifier {
    pub fn channel() -> (LoadNotifier, LoadSignal) {
        let (tx, rx) = oneshot::channel();
        (LoadNotifier { tx }, rx)
    }

    pub fn loaded(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn failed(self, err: anyhow::Error) {
        let _ = self.tx.send(Err(err));
    }
}

/// Resolve a load signal. A host that drops the notifier counts as a failure.
pub async fn wait_for_load(signal: LoadSignal) -> Result<()> {
    match signal.await {
        Ok(outcome) => outcome,
        Err(_) => Err(anyhow!("host dropped the load notification")),
    }
}

/// Asset registry and loader owned by the host application.
///
/// For streamed assets `payload` carries the bytes fetched here; host-managed
/// assets get `None` and fetch through the shared transport themselves.
pub trait AssetHost: Send + Sync {
    fn is_registered(&self, id: &str) -> bool;
    fn register(&self, asset: &AssetDescriptor);
    fn load(&self, asset: &AssetDescriptor, payload: Option<Bytes>) -> LoadSignal;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_outcomes() {
        let (n, s) = LoadNotifier::channel();
        n.loaded();
        assert!(wait_for_load(s).await.is_ok());

        let (n, s) = LoadNotifier::channel();
        n.failed(anyhow!("decode error"));
        assert_eq!(wait_for_load(s).await.unwrap_err().to_string(), "decode error");

        let (n, s) = LoadNotifier::channel();
        drop(n);
        assert!(wait_for_load(s).await.is_err());
    }
}
