//! Format selection and the `parse(asset_id)` entry point.

use std::sync::Arc;
use std::time::Instant;

use lutcraft_core::LutCube;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binary::{is_binary_lut, parse_binary};
use crate::error::ParseError;
use crate::image_lut::{parse_image, TileLayout};
use crate::leica::parse_leica_data;
use crate::lut::parse_cube_text;
use crate::source::AssetSource;

/// On-disk LUT encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LutFormat {
    /// `.MS-LUT ` packed floats.
    Binary,
    /// `.cube` text.
    Text,
    /// Image-encoded cube.
    Image,
    /// Raw Leica half-float dump.
    LeicaData,
}

impl LutFormat {
    /// Lookup order for a logical filter name without an extension.
    pub const PRECEDENCE: [LutFormat; 3] = [Self::Binary, Self::Text, Self::Image];

    /// File extensions, lowercase, preferred first.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Binary => &["bin"],
            Self::Text => &["cube"],
            Self::Image => &["png", "jpg", "jpeg"],
            Self::LeicaData => &["data"],
        }
    }

    /// Format implied by an identifier's extension.
    pub fn from_extension(asset_id: &str) -> Option<Self> {
        let (_, ext) = asset_id.rsplit_once('.')?;
        if ext.contains('/') {
            return None;
        }
        let ext = ext.to_ascii_lowercase();
        [Self::Binary, Self::Text, Self::Image, Self::LeicaData]
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Guess the format from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if is_binary_lut(bytes) {
            return Some(Self::Binary);
        }
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") || bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Image);
        }
        let head = &bytes[..bytes.len().min(256)];
        let first = head.iter().find(|b| !b.is_ascii_whitespace())?;
        let texty = head
            .iter()
            .all(|b| b.is_ascii_graphic() || b.is_ascii_whitespace() || *b >= 0x80);
        (texty && (first.is_ascii_alphanumeric() || matches!(first, b'#' | b'-' | b'.' | b'_')))
            .then_some(Self::Text)
    }
}

/// Image tiling layouts keyed by asset-id prefix (one prefix per vendor).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutRules {
    /// Layout for image assets with no matching vendor prefix.
    pub default: TileLayout,
    /// `(prefix, layout)` pairs. The longest matching prefix wins.
    pub vendors: Vec<(String, TileLayout)>,
}

impl LayoutRules {
    /// Layout to use for `asset_id`.
    pub fn layout_for(&self, asset_id: &str) -> TileLayout {
        self.vendors
            .iter()
            .filter(|(prefix, _)| asset_id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, layout)| *layout)
            .unwrap_or(self.default)
    }
}

/// Decodes LUT assets into cubes.
#[derive(Clone)]
pub struct LutParser {
    source: Arc<dyn AssetSource>,
    layouts: LayoutRules,
}

impl LutParser {
    /// Create a parser reading from `source`.
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            layouts: LayoutRules::default(),
        }
    }

    /// Use `layouts` for image-encoded assets.
    pub fn with_layouts(mut self, layouts: LayoutRules) -> Self {
        self.layouts = layouts;
        self
    }

    pub fn source(&self) -> &Arc<dyn AssetSource> {
        &self.source
    }

    pub fn layouts(&self) -> &LayoutRules {
        &self.layouts
    }

    /// Pick the concrete asset for an identifier.
    ///
    /// Identifiers with a known extension are used as-is. Otherwise an existing
    /// asset of that exact name is content-sniffed, and failing that the
    /// variants `<id>.bin`, `<id>.cube`, `<id>.png`, ... are tried in
    /// [`LutFormat::PRECEDENCE`] order.
    pub fn resolve(&self, asset_id: &str) -> Result<(String, Option<LutFormat>), ParseError> {
        if let Some(format) = LutFormat::from_extension(asset_id) {
            return Ok((asset_id.to_string(), Some(format)));
        }
        if self.source.exists(asset_id) {
            return Ok((asset_id.to_string(), None));
        }
        for format in LutFormat::PRECEDENCE {
            for ext in format.extensions() {
                let candidate = format!("{}.{}", asset_id, ext);
                if self.source.exists(&candidate) {
                    return Ok((candidate, Some(format)));
                }
            }
        }
        Err(ParseError::NotFound(asset_id.to_string()))
    }

    /// Parse the asset named by `asset_id`.
    pub fn parse(&self, asset_id: &str) -> Result<LutCube, ParseError> {
        let started = Instant::now();
        let (path, format) = self.resolve(asset_id)?;
        let bytes = self.source.read(&path)?;
        let cube = self.decode(asset_id, &bytes, format)?;
        debug!(
            "parsed {} as {:?}: N = {} in {:?}",
            path,
            format.or_else(|| LutFormat::sniff(&bytes)),
            cube.size(),
            started.elapsed()
        );
        Ok(cube)
    }

    /// Decode bytes already in memory. `format = None` sniffs the content.
    pub fn decode(
        &self,
        asset_id: &str,
        bytes: &[u8],
        format: Option<LutFormat>,
    ) -> Result<LutCube, ParseError> {
        let format = format
            .or_else(|| LutFormat::sniff(bytes))
            .ok_or_else(|| {
                ParseError::UnsupportedVariant(format!("cannot identify format of {}", asset_id))
            })?;
        match format {
            LutFormat::Binary => parse_binary(bytes),
            LutFormat::Text => parse_cube_text(&String::from_utf8_lossy(bytes)),
            LutFormat::Image => parse_image(bytes, self.layouts.layout_for(asset_id)),
            LutFormat::LeicaData => parse_leica_data(bytes),
        }
    }
}

impl std::fmt::Debug for LutParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LutParser")
            .field("layouts", &self.layouts)
            .finish_non_exhaustive()
    }
}
