//! Engine configuration, loaded from JSON.
//!
//! Every field has a default, so an empty object `{}` is a valid config:
//!
//! ```text
//! {
//!   "lanes": 0,
//!   "preload_batch": 0,
//!   "asset_root": "luts",
//!   "layouts": {
//!     "default": { "kind": "auto" },
//!     "vendors": [["Fuji/", { "kind": "hald" }]]
//!   },
//!   "render": { "intensity": 0.8 }
//! }
//! ```

use std::path::{Path, PathBuf};

use lutcraft_color::LayoutRules;
use lutcraft_core::{LutCraftError, Result};
use lutcraft_gpu::RenderParams;
use serde::{Deserialize, Serialize};

/// Configuration for a [`LutEngine`](crate::LutEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for CPU transforms and preload. 0 uses every core.
    pub lanes: usize,
    /// Filters per preload batch. 0 uses the worker count.
    pub preload_batch: usize,
    /// Directory LUT assets are read from. `None` leaves the source to the host.
    pub asset_root: Option<PathBuf>,
    /// Image LUT tiling, per vendor prefix.
    pub layouts: LayoutRules,
    /// Initial preview parameters.
    pub render: RenderParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lanes: 0,
            preload_batch: 0,
            asset_root: None,
            layouts: LayoutRules::default(),
            render: RenderParams::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LutCraftError::Config(format!("Failed to parse engine config: {e}")))
    }

    /// Load a config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LutCraftError::Config(format!("Failed to serialize engine config: {e}")))
    }

    /// Batch size for `workers` pool threads.
    pub fn batch_size(&self, workers: usize) -> usize {
        if self.preload_batch == 0 {
            workers.max(1)
        } else {
            self.preload_batch
        }
    }
}
