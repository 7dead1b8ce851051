//! Batch asset preloading with a single unified progress fraction, and
//! best-effort cache prewarming for splat scene tiles.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;
pub mod transport;

pub use api::loader_api::{load_assets, prewarm_tiles};
pub use api::simple::init_logging;
pub use config::{LoaderConfig, PrewarmConfig};
pub use engine::asset::{AssetDescriptor, AssetKind};
pub use engine::loader::{AssetLoader, LoadReport};
pub use engine::prewarm::{PrewarmReport, TilePrewarmer};
pub use engine::progress::{progress_percent, ProgressAggregator};
pub use error::{LoadError, PrewarmError, TransportError};
