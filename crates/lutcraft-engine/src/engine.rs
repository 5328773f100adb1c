//! The engine context object.

use std::sync::Arc;

use lutcraft_color::{
    apply, apply_with_cancel, AssetSource, CancelToken, FsAssetSource, LutParser, WorkerPool,
};
use lutcraft_core::{LutCraftError, LutCube, PixelBuffer, Result, SharedPixelBuffer};
use lutcraft_gpu::{LutRenderer, RenderParams, StagingArea};
use tracing::{debug, info};

use crate::cache::{SingleFlight, SourceId, ThumbnailCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::preload::{PreloadHandle, PreloadJob};

/// Owns the parser, worker pool, caches and GPU staging for one host.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct LutEngine {
    config: EngineConfig,
    parser: LutParser,
    pool: Arc<WorkerPool>,
    cubes: Arc<SingleFlight<LutCube>>,
    thumbnails: Arc<ThumbnailCache>,
    staging: Arc<StagingArea>,
}

impl LutEngine {
    /// Create an engine reading assets from `source`.
    pub fn new(config: EngineConfig, source: Arc<dyn AssetSource>) -> Result<Self> {
        let pool = WorkerPool::new(config.lanes)?;
        let parser = LutParser::new(source).with_layouts(config.layouts.clone());
        let staging = StagingArea::new(config.render);
        info!(
            "LUT engine started with {} worker(s), {} vendor layout rule(s)",
            pool.threads(),
            config.layouts.vendors.len()
        );
        Ok(Self {
            parser,
            pool: Arc::new(pool),
            cubes: Arc::new(SingleFlight::new()),
            thumbnails: Arc::new(ThumbnailCache::new()),
            staging: Arc::new(staging),
            config,
        })
    }

    /// Create an engine reading assets from `config.asset_root`.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let root = config
            .asset_root
            .clone()
            .ok_or_else(|| LutCraftError::Config("asset_root is not set".into()))?;
        Self::new(config, Arc::new(FsAssetSource::new(root)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn parser(&self) -> &LutParser {
        &self.parser
    }

    pub fn workers(&self) -> usize {
        self.pool.threads()
    }

    // ── Parsing ─────────────────────────────────────────────────

    /// Parse an asset, or return the cached cube.
    ///
    /// Concurrent first calls for one id run the parser once. Failures are
    /// not cached.
    pub fn parse_lut(&self, asset_id: &str) -> EngineResult<Arc<LutCube>> {
        self.cubes
            .get_or_try_insert_with(asset_id, || self.parser.parse(asset_id))
            .map_err(EngineError::from)
    }

    /// The cached cube for `asset_id`, without parsing.
    pub fn cached_lut(&self, asset_id: &str) -> Option<Arc<LutCube>> {
        self.cubes.get(asset_id)
    }

    pub fn cached_lut_count(&self) -> usize {
        self.cubes.len()
    }

    /// Drop every cached cube.
    pub fn clear_luts(&self) {
        self.cubes.clear();
    }

    // ── CPU transform ───────────────────────────────────────────

    /// Apply `cube` to `buffer` using every worker.
    pub fn apply_cpu(&self, buffer: &PixelBuffer, cube: &LutCube) -> PixelBuffer {
        let lanes = self.pool.threads();
        self.pool.install(|| apply(buffer, cube, lanes))
    }

    /// Like [`apply_cpu`](Self::apply_cpu), but abandons the work once `cancel` fires.
    pub fn apply_cpu_cancellable(
        &self,
        buffer: &PixelBuffer,
        cube: &LutCube,
        cancel: &CancelToken,
    ) -> EngineResult<PixelBuffer> {
        Ok(self.pool.apply(buffer, cube, cancel)?)
    }

    // ── Thumbnails ──────────────────────────────────────────────

    /// Set the image thumbnails are rendered from. Drops every cached thumbnail.
    pub fn set_source(&self, source: SharedPixelBuffer) -> SourceId {
        let id = self.thumbnails.set_source(source);
        debug!("thumbnail source changed to {}", id);
        id
    }

    pub fn clear_source(&self) {
        self.thumbnails.clear_source();
    }

    pub fn source_id(&self) -> Option<SourceId> {
        self.thumbnails.source_id()
    }

    /// The current source filtered through `asset_id`.
    ///
    /// Served from cache when possible, otherwise parsed and rendered here and
    /// stored for the current source.
    pub fn thumbnail(&self, asset_id: &str) -> EngineResult<Arc<PixelBuffer>> {
        self.thumbnail_cancellable(asset_id, &CancelToken::new())
    }

    /// Like [`thumbnail`](Self::thumbnail), but abandons the render once `cancel` fires.
    ///
    /// A cancelled render stores nothing.
    pub fn thumbnail_cancellable(
        &self,
        asset_id: &str,
        cancel: &CancelToken,
    ) -> EngineResult<Arc<PixelBuffer>> {
        let generation = self.thumbnails.generation().ok_or(EngineError::NoSource)?;
        if let Some(hit) = generation.thumbnails.get(asset_id) {
            return Ok(hit);
        }
        // Runs on a pool worker so the caller never holds a cache cell while
        // queued behind a preload batch. Single lane: a cell holder must not
        // block on a rayon join.
        self.pool.install(|| {
            let cube = self.parse_lut(asset_id)?;
            generation
                .thumbnails
                .get_or_try_insert_with(asset_id, || {
                    apply_with_cancel(&generation.source, &cube, 1, cancel)
                })
                .map_err(EngineError::from)
        })
    }

    pub fn cached_thumbnail(&self, asset_id: &str) -> Option<Arc<PixelBuffer>> {
        self.thumbnails.get(asset_id)
    }

    pub fn cached_thumbnail_count(&self) -> usize {
        self.thumbnails.len()
    }

    /// Parse and render every id not cached yet, in background batches.
    pub fn preload<I, S>(&self, asset_ids: I) -> Result<PreloadHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let job = PreloadJob {
            parser: self.parser.clone(),
            pool: Arc::clone(&self.pool),
            cubes: Arc::clone(&self.cubes),
            thumbnails: Arc::clone(&self.thumbnails),
            batch_size: self.config.batch_size(self.pool.threads()),
        };
        Ok(job.spawn(asset_ids.into_iter().map(Into::into).collect())?)
    }

    // ── GPU staging ─────────────────────────────────────────────

    /// Shared staging handle, for the host's render thread.
    pub fn staging(&self) -> Arc<StagingArea> {
        Arc::clone(&self.staging)
    }

    /// A render-thread driver consuming this engine's staging.
    pub fn renderer(&self, target_format: lutcraft_gpu::wgpu::TextureFormat) -> LutRenderer {
        LutRenderer::new(self.staging(), target_format)
    }

    pub fn stage_gpu_input(&self, image: SharedPixelBuffer) {
        self.staging.stage_input(image);
    }

    pub fn stage_gpu_lut(&self, cube: Arc<LutCube>) {
        self.staging.stage_lut(cube);
    }

    pub fn stage_gpu_grain(&self, image: SharedPixelBuffer) {
        self.staging.stage_grain(image);
    }

    /// Blend weight of the LUT, clamped to `[0, 1]`.
    pub fn set_intensity(&self, intensity: f32) {
        self.staging.set_intensity(intensity);
    }

    /// Grain overlay: intensity clamped to `[0, 1]`, scale to `[1, 10]`.
    pub fn set_grain(&self, enabled: bool, intensity: f32, scale: f32) {
        self.staging.set_grain(enabled, intensity, scale);
    }

    /// Zoom and pan of the preview quad.
    pub fn set_transform(&self, zoom: f32, offset_x: f32, offset_y: f32) {
        self.staging.set_transform(zoom, offset_x, offset_y);
    }

    pub fn render_params(&self) -> RenderParams {
        self.staging.params()
    }
}

impl std::fmt::Debug for LutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LutEngine")
            .field("workers", &self.pool.threads())
            .field("cached_luts", &self.cubes.len())
            .field("source", &self.thumbnails.source_id())
            .finish_non_exhaustive()
    }
}
