use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use super::traits::{Body, FetchResponse, HttpFetch};

pub struct HttpSource {
    client: Client,
    headers: Arc<RwLock<HashMap<String, String>>>,
}

impl HttpSource {
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self::with_client(Client::new(), headers)
    }

    pub fn with_client(client: Client, headers: HashMap<String, String>) -> Self {
        Self {
            client,
            headers: Arc::new(RwLock::new(headers)),
        }
    }

    /// Replace the extra request headers (e.g. after a token refresh).
    pub fn update_headers(&self, new_headers: HashMap<String, String>) {
        *self.headers.write() = new_headers;
    }

    fn build_request(&self, url: &str) -> RequestBuilder {
        let headers = self.headers.read().clone();
        let mut req = self.client.get(url);
        for (k, v) in &headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[async_trait]
impl HttpFetch for HttpSource {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        let resp = self
            .build_request(url)
            .send()
            .await
            .map_err(|e| anyhow!("GET {} failed: {}", url, e))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            warn!("http get failed status={} url={}", status, url);
        } else {
            debug!(
                "http get status={} url={} content_length={:?}",
                status,
                url,
                resp.content_length()
            );
        }

        let content_length = resp.content_length();
        let stream = resp.bytes_stream().map_err(anyhow::Error::from).boxed();

        Ok(FetchResponse {
            status,
            content_length,
            body: Body::Stream(stream),
        })
    }
}
