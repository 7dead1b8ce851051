// Persistent URL-keyed cache stores used by tile prewarming.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

/// A named store of response bodies keyed by exact URL string.
///
/// Writes are whole-entry and last-write-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn lookup(&self, url: &str) -> Result<Option<Bytes>>;
    async fn put(&self, url: &str, body: Bytes) -> Result<()>;

    async fn contains(&self, url: &str) -> Result<bool> {
        Ok(self.lookup(url).await?.is_some())
    }
}

/// In-process store. Lives as long as the value.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn lookup(&self, url: &str) -> Result<Option<Bytes>> {
        Ok(self.entries.read().get(url).cloned())
    }

    async fn put(&self, url: &str, body: Bytes) -> Result<()> {
        self.entries.write().insert(url.to_string(), body);
        Ok(())
    }
}

/// File-name key for a URL: lowercase hex SHA-256 of its bytes.
fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// On-disk store under `<root>/<name>/`.
///
/// Each entry is a `<key>.body` file plus a `<key>.url` file recording the
/// exact URL; the URL file is written last, so its presence implies a
/// complete body. Both are written to temp files and renamed into place.
pub struct DiskCacheStore {
    dir: PathBuf,
}

impl DiskCacheStore {
    pub async fn open(root: &Path, name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(anyhow!("invalid cache name {:?}", name));
        }
        let dir = root.join(name);
        fs::create_dir_all(&dir).await?;
        debug!("disk cache store opened at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = cache_key(url);
        (
            self.dir.join(format!("{}.body", key)),
            self.dir.join(format!("{}.url", key)),
        )
    }

    async fn recorded_url_matches(&self, url_path: &Path, url: &str) -> Result<bool> {
        match fs::read_to_string(url_path).await {
            Ok(recorded) => Ok(recorded == url),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{}", std::process::id(), seq));
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn lookup(&self, url: &str) -> Result<Option<Bytes>> {
        let (body_path, url_path) = self.entry_paths(url);
        if !self.recorded_url_matches(&url_path, url).await? {
            return Ok(None);
        }
        match fs::read(&body_path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, url: &str) -> Result<bool> {
        let (body_path, url_path) = self.entry_paths(url);
        Ok(self.recorded_url_matches(&url_path, url).await?
            && fs::try_exists(&body_path).await?)
    }

    async fn put(&self, url: &str, body: Bytes) -> Result<()> {
        let (body_path, url_path) = self.entry_paths(url);
        self.write_atomic(&body_path, &body).await?;
        self.write_atomic(&url_path, url.as_bytes()).await?;
        debug!("cached {} ({} bytes)", url, body.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_sha256_hex() {
        assert_eq!(
            cache_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            cache_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_disk_entries_named_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path(), "tiles").await.unwrap();
        let url = "https://cdn.example/scene/tile_0.webp";
        store.put(url, Bytes::from_static(b"tile")).await.unwrap();

        let key = cache_key(url);
        assert_eq!(key.len(), 64);
        assert!(store.dir().join(format!("{}.body", key)).exists());
        assert_eq!(
            std::fs::read_to_string(store.dir().join(format!("{}.url", key))).unwrap(),
            url
        );
    }

    #[tokio::test]
    async fn test_memory_store_last_write_wins() {
        let store = MemoryCacheStore::new();
        assert!(!store.contains("u").await.unwrap());
        store.put("u", Bytes::from_static(b"one")).await.unwrap();
        store.put("u", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.lookup("u").await.unwrap().unwrap(), "two");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_cache_name() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DiskCacheStore::open(dir.path(), "../escape").await.is_err());
        assert!(DiskCacheStore::open(dir.path(), "").await.is_err());
    }
}
