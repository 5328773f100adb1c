//! The LUT preview render pipeline and its uniform block.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use lutcraft_core::LutCube;
use tracing::{debug, error};

use crate::error::GpuError;
use crate::staging::RenderParams;

const SHADER_SOURCE: &str = include_str!("shaders/lut.wgsl");

/// Quad corners in clip space, drawn as a triangle strip.
pub const QUAD_POSITIONS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

/// Texture coordinates matching [`QUAD_POSITIONS`]. Image row 0 is at the top.
pub const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const UV_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];

/// Uniform block shared with `lut.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Uniforms {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
    pub zoom: f32,
    pub intensity: f32,
    pub grain_intensity: f32,
    pub grain_scale: f32,
    pub domain_min: [f32; 4],
    pub domain_max: [f32; 4],
}

impl Uniforms {
    /// Build the uniform block for one frame.
    pub fn new(params: &RenderParams, scale: Vec2, domain: ([f32; 3], [f32; 3])) -> Self {
        let (min, max) = domain;
        Self {
            scale: scale.to_array(),
            offset: params.offset,
            zoom: params.zoom,
            intensity: params.intensity,
            grain_intensity: params.effective_grain(),
            grain_scale: params.grain_scale,
            domain_min: [min[0], min[1], min[2], 0.0],
            domain_max: [max[0], max[1], max[2], 1.0],
        }
    }

    /// Domain of `cube` in the form [`Uniforms::new`] expects.
    pub fn domain_of(cube: &LutCube) -> ([f32; 3], [f32; 3]) {
        (cube.domain_min(), cube.domain_max())
    }
}

/// Scale that fits an image into a viewport without distortion.
///
/// The longer relative axis fills the viewport and the other is shrunk,
/// giving letterbox or pillarbox bars.
pub fn letterbox_scale(image: (u32, u32), viewport: (u32, u32)) -> Vec2 {
    if image.0 == 0 || image.1 == 0 || viewport.0 == 0 || viewport.1 == 0 {
        return Vec2::ONE;
    }
    let image_aspect = image.0 as f32 / image.1 as f32;
    let view_aspect = viewport.0 as f32 / viewport.1 as f32;
    if image_aspect > view_aspect {
        Vec2::new(1.0, view_aspect / image_aspect)
    } else {
        Vec2::new(image_aspect / view_aspect, 1.0)
    }
}

/// Compiled shader program, bind group layout and samplers.
pub struct LutPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub input_sampler: wgpu::Sampler,
    pub lut_sampler: wgpu::Sampler,
    pub grain_sampler: wgpu::Sampler,
}

impl LutPipeline {
    /// Compile the program for `target_format`.
    ///
    /// Validation errors raised while building the module or pipeline are
    /// captured and returned as [`GpuError::ShaderCompile`].
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lut_preview_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lut_preview_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<Uniforms>() as u64
                        ),
                    },
                    count: None,
                },
                texture_entry(1, wgpu::TextureViewDimension::D2),
                sampler_entry(2),
                texture_entry(3, wgpu::TextureViewDimension::D3),
                sampler_entry(4),
                texture_entry(5, wgpu::TextureViewDimension::D2),
                sampler_entry(6),
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lut_preview_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lut_preview_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vec2_layout(&POSITION_ATTRS), vec2_layout(&UV_ATTRS)],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            error!("LUT shader failed to build: {}", err);
            return Err(GpuError::ShaderCompile(err.to_string()));
        }
        debug!("LUT preview pipeline built for {:?}", target_format);

        Ok(Self {
            pipeline,
            bind_group_layout,
            input_sampler: create_sampler(device, "input_sampler", wgpu::AddressMode::ClampToEdge),
            lut_sampler: create_sampler(device, "lut_sampler", wgpu::AddressMode::ClampToEdge),
            grain_sampler: create_sampler(device, "grain_sampler", wgpu::AddressMode::Repeat),
        })
    }

    /// Bind the uniform buffer and the three textures at their fixed slots.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        input: &wgpu::TextureView,
        lut: &wgpu::TextureView,
        grain: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lut_preview_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.input_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(lut),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.lut_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(grain),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&self.grain_sampler),
                },
            ],
        })
    }
}

fn vec2_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

fn texture_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn create_sampler(device: &wgpu::Device, label: &str, mode: wgpu::AddressMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: mode,
        address_mode_v: mode,
        address_mode_w: mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
