//! Snapshot host: module exports and raw entries read from one JSON file.
//!
//! Useful offline, in CI and in tests. The file looks like
//!
//! ```json
//! {
//!   "modules": { "/src/content/config.ts": { "collections": { ... } } },
//!   "collections": { "blog": [ { "id": "first", "data": { ... } } ] }
//! }
//! ```

use std::path::Path;

use async_trait::async_trait;
use content_viewer_shared::{
    ConfigModule, ContentViewerError, EntryAccessor, ModuleLoader, OrderedMap, RawEntry, Result,
};
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    modules: OrderedMap<ConfigModule>,
    #[serde(default)]
    collections: OrderedMap<Vec<RawEntry>>,
}

/// A host answering from a snapshot loaded once at start-up.
#[derive(Debug, Default)]
pub struct SnapshotHost {
    snapshot: Snapshot,
}

impl SnapshotHost {
    /// Read and decode a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ContentViewerError::io(path, e))?;
        let host = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            modules = host.snapshot.modules.len(),
            collections = host.snapshot.collections.len(),
            "snapshot loaded"
        );
        Ok(host)
    }

    /// Decode a snapshot from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| ContentViewerError::decode(format!("invalid snapshot: {e}")))?;
        Ok(Self { snapshot })
    }

    /// Collection names present in the snapshot, in file order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.snapshot.collections.keys().map(String::as_str)
    }
}

#[async_trait]
impl ModuleLoader for SnapshotHost {
    async fn load_module(&self, path: &str) -> Result<ConfigModule> {
        debug!(path, "snapshot module lookup");
        self.snapshot
            .modules
            .get(path)
            .cloned()
            .ok_or_else(|| ContentViewerError::module_load(path, "not present in snapshot"))
    }
}

#[async_trait]
impl EntryAccessor for SnapshotHost {
    async fn get_entries(&self, collection: &str) -> Result<Vec<RawEntry>> {
        self.snapshot
            .collections
            .get(collection)
            .cloned()
            .ok_or_else(|| ContentViewerError::UnknownCollection {
                name: collection.to_string(),
            })
    }
}
