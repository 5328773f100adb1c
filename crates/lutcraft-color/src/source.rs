//! Where LUT asset bytes come from.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::ParseError;

/// Read-only store of LUT assets addressed by identifier.
///
/// Identifiers are `/`-separated relative paths such as `"Leica/Classic.cube"`.
pub trait AssetSource: Send + Sync {
    /// Read the whole asset. Missing or unreadable assets are `NotFound`.
    fn read(&self, asset_id: &str) -> Result<Vec<u8>, ParseError>;

    /// Whether the asset exists.
    fn exists(&self, asset_id: &str) -> bool;
}

/// Assets stored under a directory on disk.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    /// Create a source rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an identifier onto the filesystem, refusing anything that escapes the root.
    fn path_for(&self, asset_id: &str) -> Option<PathBuf> {
        let rel = Path::new(asset_id);
        if rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            Some(self.root.join(rel))
        } else {
            None
        }
    }
}

impl AssetSource for FsAssetSource {
    fn read(&self, asset_id: &str) -> Result<Vec<u8>, ParseError> {
        let path = self
            .path_for(asset_id)
            .ok_or_else(|| ParseError::NotFound(asset_id.to_string()))?;
        std::fs::read(&path).map_err(|e| {
            debug!("cannot read {}: {}", path.display(), e);
            ParseError::NotFound(format!("{} ({})", asset_id, e))
        })
    }

    fn exists(&self, asset_id: &str) -> bool {
        self.path_for(asset_id).is_some_and(|p| p.is_file())
    }
}

/// In-memory assets, used by hosts that bundle LUTs and by tests.
#[derive(Debug, Default)]
pub struct MemoryAssetSource {
    assets: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an asset.
    pub fn insert(&self, asset_id: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.assets.write().insert(asset_id.into(), bytes.into());
    }

    /// Number of stored assets.
    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

impl AssetSource for MemoryAssetSource {
    fn read(&self, asset_id: &str) -> Result<Vec<u8>, ParseError> {
        self.assets
            .read()
            .get(asset_id)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| ParseError::NotFound(asset_id.to_string()))
    }

    fn exists(&self, asset_id: &str) -> bool {
        self.assets.read().contains_key(asset_id)
    }
}
