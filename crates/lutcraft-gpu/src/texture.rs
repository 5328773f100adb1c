//! GPU texture management.

use half::f16;
use lutcraft_core::{LutCube, PixelBuffer};

use crate::error::GpuError;

/// A 2D RGBA8 texture holding the input image or the grain tile.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl GpuTexture {
    /// Create a new GPU texture with the given dimensions.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: Option<&str>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    /// Create a texture from a pixel buffer and upload its contents.
    ///
    /// Pixel values are stored unconverted (`Rgba8Unorm`), the shader looks
    /// them up in the LUT as-is.
    pub fn from_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &PixelBuffer,
        label: Option<&str>,
    ) -> Result<Self, GpuError> {
        check_image_size(image, device.limits().max_texture_dimension_2d)?;
        let texture = Self::new(
            device,
            image.width,
            image.height,
            wgpu::TextureFormat::Rgba8Unorm,
            label,
        );
        texture.upload(queue, image)?;
        Ok(texture)
    }

    /// A 1x1 texture filled with `rgba`.
    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4], label: &str) -> Self {
        let texture = Self::new(device, 1, 1, wgpu::TextureFormat::Rgba8Unorm, Some(label));
        texture.write(queue, &rgba);
        texture
    }

    /// Upload a pixel buffer of matching size to this texture.
    pub fn upload(&self, queue: &wgpu::Queue, image: &PixelBuffer) -> Result<(), GpuError> {
        if image.width != self.width || image.height != self.height {
            return Err(GpuError::InvalidUpload(format!(
                "image size {}x{} doesn't match texture size {}x{}",
                image.width, image.height, self.width, self.height
            )));
        }
        let rgba = image.to_rgba8();
        self.write(queue, &rgba);
        Ok(())
    }

    fn write(&self, queue: &wgpu::Queue, rgba: &[u8]) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Whether `image` can be uploaded without reallocating.
    pub fn fits(&self, image: &PixelBuffer) -> bool {
        self.width == image.width && self.height == image.height
    }

    /// Memory usage estimate in bytes.
    pub fn memory_size(&self) -> usize {
        let bytes_per_pixel = match self.format {
            wgpu::TextureFormat::Rgba8UnormSrgb | wgpu::TextureFormat::Rgba8Unorm => 4,
            wgpu::TextureFormat::Rgba16Float => 8,
            wgpu::TextureFormat::Rgba32Float => 16,
            _ => 4,
        };
        (self.width * self.height) as usize * bytes_per_pixel
    }
}

/// The 3D LUT texture, sampled trilinearly by the fragment stage.
///
/// Stored as `Rgba16Float` because 32-bit float textures are not filterable
/// without an optional feature.
pub struct LutTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: u32,
}

impl LutTexture {
    /// Allocate a texture for `cube` and upload its samples.
    pub fn from_cube(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        cube: &LutCube,
    ) -> Result<Self, GpuError> {
        let size = cube.size() as u32;
        let max = device.limits().max_texture_dimension_3d;
        if size > max {
            return Err(GpuError::InvalidUpload(format!(
                "LUT size {} exceeds the device 3D texture limit {}",
                size, max
            )));
        }

        let extent = wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: size,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("LUT Texture 3D"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texels = cube_to_rgba16f(cube);
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size * 8),
                rows_per_image: Some(size),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            size,
        })
    }

    pub fn memory_size(&self) -> usize {
        (self.size as usize).pow(3) * 8
    }
}

/// Expand RGB samples to RGBA half floats in texture order.
///
/// The cube's red-fastest layout already matches x, y, z = r, g, b.
pub fn cube_to_rgba16f(cube: &LutCube) -> Vec<f16> {
    let mut texels = Vec::with_capacity(cube.cell_count() * 4);
    for rgb in cube.samples().chunks_exact(3) {
        texels.extend(rgb.iter().map(|v| f16::from_f32(*v)));
        texels.push(f16::ONE);
    }
    texels
}

/// Reject images the device cannot hold as a single 2D texture.
pub fn check_image_size(image: &PixelBuffer, max_dimension: u32) -> Result<(), GpuError> {
    if image.width == 0 || image.height == 0 {
        return Err(GpuError::InvalidUpload(format!(
            "cannot upload an empty {}x{} image",
            image.width, image.height
        )));
    }
    if image.width > max_dimension || image.height > max_dimension {
        return Err(GpuError::InvalidUpload(format!(
            "{}x{} image exceeds the device texture limit {}",
            image.width, image.height, max_dimension
        )));
    }
    Ok(())
}
