// Default transport: performs transfers through an `HttpFetch` and reports
// cumulative progress to the request's listeners.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::debug;

use super::traits::{TransferOutcome, TransferRequest, Transport};
use crate::config::MAX_PREALLOC_BYTES;
use crate::source::traits::{Body, HttpFetch};

pub struct HttpTransport {
    fetch: Arc<dyn HttpFetch>,
}

impl HttpTransport {
    pub fn new(fetch: Arc<dyn HttpFetch>) -> Self {
        Self { fetch }
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<Bytes> {
        let url = request
            .target()
            .ok_or_else(|| anyhow!("transfer sent before open"))?;

        let resp = self.fetch.get(url).await?;
        if !resp.is_success() {
            return Err(anyhow!("transfer failed: HTTP {} ({})", resp.status, url));
        }

        let total = resp.content_length;
        match resp.body {
            Body::Stream(mut stream) => {
                let capacity = total.unwrap_or(0).min(MAX_PREALLOC_BYTES);
                let mut buf = BytesMut::with_capacity(capacity as usize);
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    buf.extend_from_slice(&chunk);
                    request.notify_progress(buf.len() as u64, total);
                }
                Ok(buf.freeze())
            }
            Body::Whole(read) => {
                let data = read.await?;
                request.notify_progress(data.len() as u64, total);
                Ok(data)
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn open(&self, request: &mut TransferRequest, url: &str) {
        request.set_target(url);
    }

    async fn send(&self, request: TransferRequest) -> Result<Bytes> {
        let result = self.transfer(&request).await;
        let outcome = match &result {
            Ok(data) => {
                debug!(
                    "transfer complete url={:?} bytes={}",
                    request.target(),
                    data.len()
                );
                TransferOutcome::Completed
            }
            Err(e) => {
                debug!("transfer failed url={:?}: {}", request.target(), e);
                TransferOutcome::Failed
            }
        };
        request.notify_end(outcome);
        result
    }
}
