//! LutCraft GPU - wgpu preview pipeline for 3D LUTs.
//!
//! Producers on any thread stage images, cubes and parameters through a
//! shared [`StagingArea`]; the host's render thread drives a [`LutRenderer`]
//! that uploads them and draws one full-screen quad per frame.

pub mod context;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod staging;
pub mod texture;

pub use context::GpuContext;
pub use error::GpuError;
pub use pipeline::{letterbox_scale, LutPipeline, Uniforms};
pub use renderer::{DriverState, FrameStats, GpuResourceSet, LutRenderer};
pub use staging::{RenderParams, ResourceKind, StagingArea};
pub use texture::{GpuTexture, LutTexture};
pub use wgpu;
