//! Render-thread driver for the LUT preview.
//!
//! The driver is `Uninitialized` until the host reports a rendering context,
//! then `Ready` with a full [`GpuResourceSet`]. Losing the context drops the
//! whole set; the next `on_context_created` rebuilds it and re-stages the
//! last uploaded input, LUT and grain so the user's selection survives.

use std::sync::Arc;

use glam::Vec2;
use lutcraft_core::{LutCube, PixelBuffer};
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

use crate::context::GpuContext;
use crate::error::GpuError;
use crate::pipeline::{letterbox_scale, LutPipeline, Uniforms, QUAD_POSITIONS, QUAD_UVS};
use crate::staging::{ResourceKind, StagingArea};
use crate::texture::{GpuTexture, LutTexture};

const NEUTRAL_GRAIN: [u8; 4] = [128, 128, 128, 255];

/// Everything allocated for one context generation.
pub struct GpuResourceSet {
    pipeline: LutPipeline,
    input: GpuTexture,
    has_input: bool,
    lut: LutTexture,
    lut_domain: ([f32; 3], [f32; 3]),
    grain: GpuTexture,
    vertex_buffer: wgpu::Buffer,
    uv_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    bound_input: (u32, u32),
}

impl GpuResourceSet {
    fn create(ctx: &GpuContext, target_format: wgpu::TextureFormat) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let queue = &ctx.queue;
        let pipeline = LutPipeline::new(device, target_format)?;

        let input = GpuTexture::solid(device, queue, [0, 0, 0, 255], "Input Texture");
        let grain = GpuTexture::solid(device, queue, NEUTRAL_GRAIN, "Grain Texture");
        let identity = LutCube::identity(2).map_err(|e| GpuError::InvalidUpload(e.to_string()))?;
        let lut = LutTexture::from_cube(device, queue, &identity)?;

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lut_preview_vertices"),
            contents: bytemuck::cast_slice(&QUAD_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uv_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lut_preview_uvs"),
            contents: bytemuck::cast_slice(&QUAD_UVS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lut_preview_uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bound_input = (input.width, input.height);
        let bind_group =
            pipeline.bind_group(device, &uniform_buffer, &input.view, &lut.view, &grain.view);

        Ok(Self {
            pipeline,
            input,
            has_input: false,
            lut,
            lut_domain: Uniforms::domain_of(&identity),
            grain,
            vertex_buffer,
            uv_buffer,
            bound_input,
            uniform_buffer,
            bind_group,
        })
    }

    /// Upload at most one pending resource of each kind. Returns how many were uploaded.
    ///
    /// Every kind is attempted even after a failure, and the bind group is
    /// rebuilt whenever anything was uploaded, so a reallocated texture is
    /// never left behind a stale view. The first failure is returned.
    fn upload_pending(
        &mut self,
        ctx: &GpuContext,
        staging: &StagingArea,
    ) -> Result<usize, GpuError> {
        let mut report = UploadReport::default();

        if let Some(image) = staging.take_input() {
            let result = upload_image(ctx, &mut self.input, &image, "Input Texture");
            if result.is_ok() {
                self.has_input = true;
                staging.commit_input(image);
            }
            report.record(ResourceKind::Input, result);
        }
        if let Some(cube) = staging.take_lut() {
            let result = LutTexture::from_cube(&ctx.device, &ctx.queue, &cube).map(|lut| {
                self.lut = lut;
                self.lut_domain = Uniforms::domain_of(&cube);
            });
            if result.is_ok() {
                staging.commit_lut(cube);
            }
            report.record(ResourceKind::Lut, result);
        }
        if let Some(image) = staging.take_grain() {
            let result = upload_image(ctx, &mut self.grain, &image, "Grain Texture");
            if result.is_ok() {
                staging.commit_grain(image);
            }
            report.record(ResourceKind::Grain, result);
        }

        if report.needs_rebind() {
            self.rebind(&ctx.device);
            debug!("uploaded {} staged resource(s)", report.uploaded);
        }
        report.into_result()
    }

    fn rebind(&mut self, device: &wgpu::Device) {
        self.bind_group = self.pipeline.bind_group(
            device,
            &self.uniform_buffer,
            &self.input.view,
            &self.lut.view,
            &self.grain.view,
        );
        self.bound_input = (self.input.width, self.input.height);
    }

    /// Size of the input texture the current bind group samples.
    pub fn bound_input_size(&self) -> (u32, u32) {
        self.bound_input
    }

    /// Image size the letterbox is computed from, or the viewport before any input arrives.
    fn image_size(&self, viewport: (u32, u32)) -> (u32, u32) {
        if self.has_input {
            (self.input.width, self.input.height)
        } else {
            viewport
        }
    }

    pub fn memory_size(&self) -> usize {
        self.input.memory_size() + self.lut.memory_size() + self.grain.memory_size()
    }
}

/// Outcome of one frame's uploads.
#[derive(Debug, Default)]
struct UploadReport {
    uploaded: usize,
    error: Option<GpuError>,
}

impl UploadReport {
    fn record(&mut self, kind: ResourceKind, result: Result<(), GpuError>) {
        match result {
            Ok(()) => self.uploaded += 1,
            Err(e) => {
                warn!("dropping staged {:?}: {}", kind, e);
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
    }

    fn needs_rebind(&self) -> bool {
        self.uploaded > 0
    }

    fn into_result(self) -> Result<usize, GpuError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.uploaded),
        }
    }
}

/// Write into `texture` when the size matches, otherwise reallocate it.
fn upload_image(
    ctx: &GpuContext,
    texture: &mut GpuTexture,
    image: &PixelBuffer,
    label: &str,
) -> Result<(), GpuError> {
    if texture.fits(image) {
        texture.upload(&ctx.queue, image)
    } else {
        *texture = GpuTexture::from_pixels(&ctx.device, &ctx.queue, image, Some(label))?;
        Ok(())
    }
}

/// Driver state.
pub enum DriverState {
    Uninitialized,
    Ready(Box<GpuResourceSet>),
}

/// What one frame did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub uploaded: usize,
    pub scale: Vec2,
}

/// Drives the preview from the host's render thread.
pub struct LutRenderer {
    staging: Arc<StagingArea>,
    target_format: wgpu::TextureFormat,
    state: DriverState,
    generation: u64,
    frames: u64,
}

impl LutRenderer {
    /// Create an uninitialized driver that consumes `staging`.
    pub fn new(staging: Arc<StagingArea>, target_format: wgpu::TextureFormat) -> Self {
        Self {
            staging,
            target_format,
            state: DriverState::Uninitialized,
            generation: 0,
            frames: 0,
        }
    }

    pub fn staging(&self) -> &Arc<StagingArea> {
        &self.staging
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, DriverState::Ready(_))
    }

    /// Number of context generations seen so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Build the resource set for a fresh context and enter `Ready`.
    pub fn on_context_created(&mut self, ctx: &GpuContext) -> Result<(), GpuError> {
        let set = GpuResourceSet::create(ctx, self.target_format)?;
        self.state = DriverState::Ready(Box::new(set));
        self.generation += 1;
        let restaged = self.staging.restage_committed();
        info!(
            "LUT renderer ready (generation {}, {} resource(s) re-staged)",
            self.generation, restaged
        );
        Ok(())
    }

    /// Drop every GPU handle and return to `Uninitialized`.
    pub fn on_context_lost(&mut self) {
        if let DriverState::Ready(_) = std::mem::replace(&mut self.state, DriverState::Uninitialized)
        {
            warn!("LUT renderer lost its context (generation {})", self.generation);
        }
    }

    fn resources(&mut self) -> Result<&mut GpuResourceSet, GpuError> {
        match &mut self.state {
            DriverState::Ready(set) => Ok(set),
            DriverState::Uninitialized => Err(GpuError::ResourceLost),
        }
    }

    /// Upload pending resources and draw one frame into `target`.
    ///
    /// `viewport` is the target size in pixels. A resource whose upload fails
    /// is dropped and the error returned without drawing; its previous texture
    /// stays bound while the other kinds uploaded this frame take effect.
    pub fn render_frame(
        &mut self,
        ctx: &GpuContext,
        target: &wgpu::TextureView,
        viewport: (u32, u32),
    ) -> Result<FrameStats, GpuError> {
        if ctx.is_lost() {
            self.on_context_lost();
            return Err(GpuError::ResourceLost);
        }
        let staging = Arc::clone(&self.staging);
        let set = self.resources()?;

        let uploaded = set.upload_pending(ctx, &staging)?;

        let scale = letterbox_scale(set.image_size(viewport), viewport);
        let uniforms = Uniforms::new(&staging.params(), scale, set.lut_domain);
        ctx.queue
            .write_buffer(&set.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lut_preview_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lut_preview_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&set.pipeline.pipeline);
            pass.set_bind_group(0, &set.bind_group, &[]);
            pass.set_vertex_buffer(0, set.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, set.uv_buffer.slice(..));
            pass.draw(0..QUAD_POSITIONS.len() as u32, 0..1);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));

        self.frames += 1;
        Ok(FrameStats { uploaded, scale })
    }
}

impl std::fmt::Debug for LutRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LutRenderer")
            .field("ready", &self.is_ready())
            .field("generation", &self.generation)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}
