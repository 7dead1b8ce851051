//! Typed errors for the failures a caller has to branch on.
//!
//! Everything else travels as `anyhow::Error`.

use thiserror::Error;

/// Errors raised by the shared transport hub.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// An interception scope is already installed on this hub.
    #[error("transport interception scope already active")]
    ScopeActive,
}

/// Errors that abort a whole asset batch before any asset is started.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot install transfer interception: {0}")]
    Interception(#[from] TransportError),
}

/// Errors that abort a prewarm run. Per-tile failures never surface here.
#[derive(Debug, Error)]
pub enum PrewarmError {
    /// The manifest request completed with a non-success status.
    #[error("manifest fetch failed: HTTP {status} ({url})")]
    ManifestStatus { url: String, status: u16 },

    /// The manifest request failed at the transport level.
    #[error("manifest fetch failed ({url}): {source}")]
    ManifestFetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// The manifest body is not valid JSON.
    #[error("manifest parse failed ({url}): {source}")]
    ManifestParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The persistent cache store could not be opened.
    #[error("cache store unavailable: {0}")]
    CacheUnavailable(#[source] anyhow::Error),
}
