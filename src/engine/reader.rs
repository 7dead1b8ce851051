// Byte Transfer Reader: GET a resource and report byte deltas as they arrive.

use anyhow::{anyhow, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::debug;

use crate::config::MAX_PREALLOC_BYTES;
use crate::source::traits::{Body, HttpFetch};

/// Fetch `url`, calling `on_delta` with each chunk length as it arrives.
///
/// When the body cannot be read incrementally it is read in one go and a
/// single delta is reported: `size_hint` when it is non-zero, otherwise the
/// actual body length. Either way every successful read reports at least once.
pub async fn read_with_progress<F>(
    source: &dyn HttpFetch,
    url: &str,
    size_hint: u64,
    mut on_delta: F,
) -> Result<Bytes>
where
    F: FnMut(u64),
{
    let resp = source.get(url).await?;
    if !resp.is_success() {
        return Err(anyhow!("read failed: HTTP {} ({})", resp.status, url));
    }

    match resp.body {
        Body::Stream(mut stream) => {
            let capacity = resp.content_length.unwrap_or(size_hint).min(MAX_PREALLOC_BYTES);
            let mut buf = BytesMut::with_capacity(capacity as usize);
            let mut chunks = 0usize;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if chunk.is_empty() {
                    continue;
                }
                chunks += 1;
                buf.extend_from_slice(&chunk);
                on_delta(chunk.len() as u64);
            }
            debug!("read {} bytes in {} chunks from {}", buf.len(), chunks, url);
            Ok(buf.freeze())
        }
        Body::Whole(read) => {
            let data = read.await?;
            let delta = if size_hint > 0 {
                size_hint
            } else {
                data.len() as u64
            };
            on_delta(delta);
            debug!(
                "read {} bytes from {} without streaming, reported {}",
                data.len(),
                url,
                delta
            );
            Ok(data)
        }
    }
}
