//! GPU context management.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::GpuError;

/// GPU context holding device and queue.
///
/// One context is one rendering-context generation. When the device is lost
/// the host drops this context and creates a new one.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Create a new GPU context on the best available adapter.
    pub async fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        info!("Using GPU adapter: {:?}", adapter.get_info());

        Self::from_adapter(instance, adapter).await
    }

    /// Create a context on an adapter chosen by the host (for example one
    /// compatible with its window surface).
    pub async fn from_adapter(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
    ) -> Result<Self, GpuError> {
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("LutCraft Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| GpuError::Device(e.to_string()))?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            warn!("GPU device lost ({:?}): {}", reason, message);
            flag.store(true, Ordering::Release);
        });

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            lost,
        })
    }

    /// Create a new GPU context (blocking version).
    pub fn new_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }

    /// Get adapter info.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Whether the device has been lost since creation.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Largest 2D texture edge the device accepts.
    pub fn max_texture_2d(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Largest 3D texture edge the device accepts.
    pub fn max_texture_3d(&self) -> u32 {
        self.device.limits().max_texture_dimension_3d
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.adapter.get_info().name)
            .field("lost", &self.is_lost())
            .finish_non_exhaustive()
    }
}
