// Entry points for a host application that is happy with the defaults.

use std::path::Path;
use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::engine::asset::AssetDescriptor;
use crate::engine::cache::DiskCacheStore;
use crate::engine::host::AssetHost;
use crate::engine::loader::{AssetLoader, CompletionCallback, LoadReport};
use crate::engine::prewarm::{PrewarmReport, TilePrewarmer};
use crate::engine::progress::ProgressCallback;
use crate::error::{LoadError, PrewarmError};
use crate::source::http_source::HttpSource;
use crate::transport::hub::TransportHub;

/// Load `assets` into `host`, observing host transfers on the global hub.
pub async fn load_assets(
    host: Arc<dyn AssetHost>,
    assets: Vec<AssetDescriptor>,
    config: LoaderConfig,
    on_progress: Option<ProgressCallback>,
    on_complete: Option<CompletionCallback>,
) -> Result<LoadReport, LoadError> {
    let source = Arc::new(HttpSource::new(config.headers.clone()));
    let loader = AssetLoader::new(host, source, TransportHub::global(), config);
    loader.load_all(assets, on_progress, on_complete).await
}

/// Prewarm the tiles of one splat manifest into a disk store under `cache_root`.
pub async fn prewarm_tiles(
    manifest_url: &str,
    cache_root: &Path,
    config: &LoaderConfig,
    on_progress: Option<ProgressCallback>,
) -> Result<PrewarmReport, PrewarmError> {
    let store = DiskCacheStore::open(cache_root, &config.prewarm.cache_name)
        .await
        .map_err(PrewarmError::CacheUnavailable)?;
    let source = Arc::new(HttpSource::new(config.headers.clone()));
    TilePrewarmer::new(source, Arc::new(store), config.prewarm.clone())
        .prewarm(manifest_url, on_progress)
        .await
}
