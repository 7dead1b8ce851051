// Shared fixtures: a fake upstream server and an in-memory asset host.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use splat_preload::engine::asset::AssetDescriptor;
use splat_preload::engine::host::{AssetHost, LoadNotifier, LoadSignal};
use splat_preload::transport::hub::TransportHub;

/// Files served by the fake upstream, and how often each path was requested.
#[derive(Default)]
pub struct Upstream {
    files: HashMap<String, Vec<u8>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl Upstream {
    pub fn with_files(files: &[(&str, Vec<u8>)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, data)| (p.to_string(), data.clone()))
                .collect(),
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().values().sum()
    }
}

async fn serve_file(State(upstream): State<Arc<Upstream>>, Path(path): Path<String>) -> Response {
    *upstream.hits.lock().entry(path.clone()).or_insert(0) += 1;

    if path == "broken/500.json" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    match upstream.files.get(&path) {
        Some(data) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::CONTENT_LENGTH, data.len().to_string()),
            ],
            data.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// Start the fake upstream on a random port. Files live under `/files/`.
pub async fn start_upstream(upstream: Arc<Upstream>) -> SocketAddr {
    let app = Router::new()
        .route("/files/{*path}", get(serve_file))
        .with_state(upstream);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

/// Deterministic test content.
pub fn content(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_add(seed)).collect()
}

/// Asset host double. Streamed assets resolve from their payload; host-managed
/// assets are fetched through the hub in a background task.
pub struct MockHost {
    hub: Arc<TransportHub>,
    registered: Mutex<HashSet<String>>,
    registrations: Mutex<Vec<String>>,
    payloads: Mutex<HashMap<String, Bytes>>,
    fail_ids: HashSet<String>,
}

impl MockHost {
    pub fn new(hub: Arc<TransportHub>) -> Self {
        Self {
            hub,
            registered: Mutex::new(HashSet::new()),
            registrations: Mutex::new(Vec::new()),
            payloads: Mutex::new(HashMap::new()),
            fail_ids: HashSet::new(),
        }
    }

    /// Make the host itself reject these assets.
    pub fn failing(mut self, ids: &[&str]) -> Self {
        self.fail_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn preregister(&self, id: &str) {
        self.registered.lock().insert(id.to_string());
    }

    pub fn registrations(&self) -> Vec<String> {
        self.registrations.lock().clone()
    }

    pub fn payload(&self, id: &str) -> Option<Bytes> {
        self.payloads.lock().get(id).cloned()
    }
}

impl AssetHost for MockHost {
    fn is_registered(&self, id: &str) -> bool {
        self.registered.lock().contains(id)
    }

    fn register(&self, asset: &AssetDescriptor) {
        self.registered.lock().insert(asset.id.clone());
        self.registrations.lock().push(asset.id.clone());
    }

    fn load(&self, asset: &AssetDescriptor, payload: Option<Bytes>) -> LoadSignal {
        let (notifier, signal) = LoadNotifier::channel();
        if self.fail_ids.contains(&asset.id) {
            notifier.failed(anyhow!("host rejected {}", asset.id));
            return signal;
        }
        match payload {
            Some(data) => {
                self.payloads.lock().insert(asset.id.clone(), data);
                notifier.loaded();
            }
            None => {
                let hub = self.hub.clone();
                let url = asset.url.clone();
                tokio::spawn(async move {
                    match hub.fetch(&url).await {
                        Ok(_) => notifier.loaded(),
                        Err(e) => notifier.failed(e),
                    }
                });
            }
        }
        signal
    }
}
