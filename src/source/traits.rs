use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;

/// Response body of a GET. Either an incremental chunk stream or a single
/// whole-buffer read when the source cannot deliver chunks.
pub enum Body {
    Stream(BoxStream<'static, Result<Bytes>>),
    Whole(BoxFuture<'static, Result<Bytes>>),
}

impl Body {
    pub fn supports_incremental(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// Read the whole body into one buffer.
    pub async fn collect(self) -> Result<Bytes> {
        match self {
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
            Body::Whole(read) => read.await,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Stream(_) => f.write_str("Body::Stream"),
            Body::Whole(_) => f.write_str("Body::Whole"),
        }
    }
}

#[derive(Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Body,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse>;
}
