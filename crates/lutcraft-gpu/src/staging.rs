//! Cross-thread handoff of GPU resources and render parameters.
//!
//! Any thread may stage an input image, a LUT cube or a grain tile; only the
//! render thread consumes them. Each kind has a single pending slot, so
//! staging twice before the next frame drops the first value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lutcraft_core::{LutCube, SharedPixelBuffer};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 10.0;
pub const MIN_GRAIN_SCALE: f32 = 1.0;
pub const MAX_GRAIN_SCALE: f32 = 10.0;
/// Pan offsets are in clip-space units.
pub const MAX_OFFSET: f32 = 2.0;

/// User-controlled parameters of the preview draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Blend weight between original (0) and transformed (1) color.
    pub intensity: f32,
    pub grain_enabled: bool,
    pub grain_intensity: f32,
    /// Grain tile repetitions across the image.
    pub grain_scale: f32,
    pub zoom: f32,
    pub offset: [f32; 2],
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            grain_enabled: false,
            grain_intensity: 0.0,
            grain_scale: 1.0,
            zoom: 1.0,
            offset: [0.0, 0.0],
        }
    }
}

impl RenderParams {
    /// Clamp every field into its valid range. Non-finite values fall back to defaults.
    pub fn clamped(self) -> Self {
        let d = Self::default();
        Self {
            intensity: clamp_or(self.intensity, 0.0, 1.0, d.intensity),
            grain_enabled: self.grain_enabled,
            grain_intensity: clamp_or(self.grain_intensity, 0.0, 1.0, d.grain_intensity),
            grain_scale: clamp_or(self.grain_scale, MIN_GRAIN_SCALE, MAX_GRAIN_SCALE, d.grain_scale),
            zoom: clamp_or(self.zoom, MIN_ZOOM, MAX_ZOOM, d.zoom),
            offset: [
                clamp_or(self.offset[0], -MAX_OFFSET, MAX_OFFSET, 0.0),
                clamp_or(self.offset[1], -MAX_OFFSET, MAX_OFFSET, 0.0),
            ],
        }
    }

    /// Grain strength as seen by the shader.
    pub fn effective_grain(&self) -> f32 {
        if self.grain_enabled {
            self.grain_intensity
        } else {
            0.0
        }
    }
}

fn clamp_or(v: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v.clamp(lo, hi)
    } else {
        fallback
    }
}

/// Kinds of staged resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Input,
    Lut,
    Grain,
}

/// One pending value plus the last value the render thread uploaded.
#[derive(Debug)]
struct Slot<T> {
    pending: Option<T>,
    committed: Option<T>,
}

impl<T: Clone> Slot<T> {
    const fn new() -> Self {
        Self {
            pending: None,
            committed: None,
        }
    }

    /// Returns true when an unconsumed value was overwritten.
    fn stage(&mut self, value: T) -> bool {
        self.pending.replace(value).is_some()
    }

    fn take(&mut self) -> Option<T> {
        self.pending.take()
    }

    fn commit(&mut self, value: T) {
        self.committed = Some(value);
    }

    /// Put the committed value back into the pending slot unless something newer is waiting.
    fn restage(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.committed.clone();
            self.pending.is_some()
        } else {
            false
        }
    }
}

/// Thread-safe staging handle shared between producers and the render thread.
#[derive(Debug)]
pub struct StagingArea {
    input: Mutex<Slot<SharedPixelBuffer>>,
    lut: Mutex<Slot<Arc<LutCube>>>,
    grain: Mutex<Slot<SharedPixelBuffer>>,
    params: RwLock<RenderParams>,
    superseded: AtomicU64,
}

impl Default for StagingArea {
    fn default() -> Self {
        Self::new(RenderParams::default())
    }
}

impl StagingArea {
    pub fn new(params: RenderParams) -> Self {
        Self {
            input: Mutex::new(Slot::new()),
            lut: Mutex::new(Slot::new()),
            grain: Mutex::new(Slot::new()),
            params: RwLock::new(params.clamped()),
            superseded: AtomicU64::new(0),
        }
    }

    pub fn stage_input(&self, image: SharedPixelBuffer) {
        let dropped = self.input.lock().stage(image);
        self.note_superseded(ResourceKind::Input, dropped);
    }

    pub fn stage_lut(&self, cube: Arc<LutCube>) {
        let dropped = self.lut.lock().stage(cube);
        self.note_superseded(ResourceKind::Lut, dropped);
    }

    pub fn stage_grain(&self, image: SharedPixelBuffer) {
        let dropped = self.grain.lock().stage(image);
        self.note_superseded(ResourceKind::Grain, dropped);
    }

    fn note_superseded(&self, kind: ResourceKind, dropped: bool) {
        if dropped {
            let total = self.superseded.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("staged {:?} superseded before upload ({} total)", kind, total);
        }
    }

    /// Number of staged values overwritten before the render thread consumed them.
    pub fn superseded_count(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    /// Whether any resource is waiting for upload.
    pub fn has_pending(&self) -> bool {
        self.input.lock().pending.is_some()
            || self.lut.lock().pending.is_some()
            || self.grain.lock().pending.is_some()
    }

    pub(crate) fn take_input(&self) -> Option<SharedPixelBuffer> {
        self.input.lock().take()
    }

    pub(crate) fn take_lut(&self) -> Option<Arc<LutCube>> {
        self.lut.lock().take()
    }

    pub(crate) fn take_grain(&self) -> Option<SharedPixelBuffer> {
        self.grain.lock().take()
    }

    pub(crate) fn commit_input(&self, image: SharedPixelBuffer) {
        self.input.lock().commit(image);
    }

    pub(crate) fn commit_lut(&self, cube: Arc<LutCube>) {
        self.lut.lock().commit(cube);
    }

    pub(crate) fn commit_grain(&self, image: SharedPixelBuffer) {
        self.grain.lock().commit(image);
    }

    /// Re-stage the last uploaded resources after the context was recreated.
    ///
    /// Returns how many kinds were re-staged.
    pub fn restage_committed(&self) -> usize {
        [
            self.input.lock().restage(),
            self.lut.lock().restage(),
            self.grain.lock().restage(),
        ]
        .into_iter()
        .filter(|restaged| *restaged)
        .count()
    }

    /// Current parameters.
    pub fn params(&self) -> RenderParams {
        *self.params.read()
    }

    /// Replace all parameters at once.
    pub fn set_params(&self, params: RenderParams) {
        *self.params.write() = params.clamped();
    }

    pub fn set_intensity(&self, intensity: f32) {
        let mut params = self.params.write();
        *params = RenderParams {
            intensity,
            ..*params
        }
        .clamped();
    }

    pub fn set_grain(&self, enabled: bool, intensity: f32, scale: f32) {
        let mut params = self.params.write();
        *params = RenderParams {
            grain_enabled: enabled,
            grain_intensity: intensity,
            grain_scale: scale,
            ..*params
        }
        .clamped();
    }

    pub fn set_transform(&self, zoom: f32, offset_x: f32, offset_y: f32) {
        let mut params = self.params.write();
        *params = RenderParams {
            zoom,
            offset: [offset_x, offset_y],
            ..*params
        }
        .clamped();
    }
}
