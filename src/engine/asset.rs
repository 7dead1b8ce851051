// Asset descriptors and the per-asset load state machine.

use std::fmt;

use serde::Deserialize;

/// Type tag of an asset. The set is open: unknown tags become `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum AssetKind {
    Binary,
    Script,
    Texture,
    /// Gaussian splat scene, fetched by the host's own loader.
    Splat,
    Other(String),
}

/// How an asset's bytes reach the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPath {
    /// Fetched by the reader here, payload handed to the host.
    Streamed,
    /// Fetched by the host subsystem through the shared transport.
    HostManaged,
}

impl AssetKind {
    pub fn as_str(&self) -> &str {
        match self {
            AssetKind::Binary => "binary",
            AssetKind::Script => "script",
            AssetKind::Texture => "texture",
            AssetKind::Splat => "gsplat",
            AssetKind::Other(tag) => tag,
        }
    }

    pub fn load_path(&self) -> LoadPath {
        match self {
            AssetKind::Splat => LoadPath::HostManaged,
            _ => LoadPath::Streamed,
        }
    }
}

impl From<String> for AssetKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "binary" => AssetKind::Binary,
            "script" => AssetKind::Script,
            "texture" => AssetKind::Texture,
            "gsplat" | "splat" => AssetKind::Splat,
            _ => AssetKind::Other(tag),
        }
    }
}

impl From<&str> for AssetKind {
    fn from(tag: &str) -> Self {
        AssetKind::from(tag.to_string())
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: AssetKind,
    pub url: String,
    /// Planning estimate of the transfer size. Not authoritative.
    #[serde(default)]
    pub size_hint: Option<f64>,
}

impl AssetDescriptor {
    pub fn new(id: &str, kind: AssetKind, url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            url: url.to_string(),
            size_hint: None,
        }
    }

    pub fn with_size_hint(mut self, bytes: f64) -> Self {
        self.size_hint = Some(bytes);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Size hint in whole bytes. Absent, non-positive and non-finite hints are 0.
    pub fn hint_bytes(&self) -> u64 {
        match self.size_hint {
            Some(h) if h.is_finite() && h > 0.0 => h.round() as u64,
            _ => 0,
        }
    }

    /// Last path segment of the locator, without query or fragment.
    pub fn file_name(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or("");
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// Sum of size hints over the assets whose bytes are observed.
///
/// Host-managed assets only count when their transfers are intercepted.
pub fn total_estimated_bytes(assets: &[AssetDescriptor], observe_host_transfers: bool) -> u64 {
    assets
        .iter()
        .filter(|a| observe_host_transfers || a.kind.load_path() == LoadPath::Streamed)
        .fold(0u64, |sum, a| sum.saturating_add(a.hint_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    Loading,
    Loaded,
    Failed,
}

impl AssetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AssetState::Loaded | AssetState::Failed)
    }
}

/// One asset's progress through `Pending -> Loading -> {Loaded | Failed}`.
#[derive(Debug)]
pub struct AssetLoadTask {
    pub descriptor: AssetDescriptor,
    state: AssetState,
    error: Option<String>,
}

impl AssetLoadTask {
    pub fn new(descriptor: AssetDescriptor) -> Self {
        Self {
            descriptor,
            state: AssetState::Pending,
            error: None,
        }
    }

    pub fn state(&self) -> AssetState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn start(&mut self) {
        if self.state == AssetState::Pending {
            self.state = AssetState::Loading;
        }
    }

    pub fn complete(&mut self) {
        if !self.state.is_terminal() {
            self.state = AssetState::Loaded;
        }
    }

    pub fn fail(&mut self, message: String) {
        if !self.state.is_terminal() {
            self.state = AssetState::Failed;
            self.error = Some(message);
        }
    }
}
