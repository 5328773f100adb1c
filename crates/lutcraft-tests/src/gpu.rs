//! Integration tests for the GPU subsystem.
//!
//! Exercises CPU-side logic only. No adapter is required.

use std::sync::Arc;

use lutcraft_color::{parse_cube_text, to_cube_text};
use lutcraft_core::{LutCube, PixelBuffer, PixelFormat};
use lutcraft_engine::{EngineConfig, LutEngine};
use lutcraft_gpu::texture::{check_image_size, cube_to_rgba16f};
use lutcraft_gpu::wgpu::TextureFormat;
use lutcraft_gpu::{letterbox_scale, GpuError, RenderParams, Uniforms};

fn engine() -> LutEngine {
    let source = Arc::new(lutcraft_color::MemoryAssetSource::new());
    LutEngine::new(EngineConfig::default(), source).unwrap()
}

#[test]
fn staged_resources_reach_a_fresh_renderer() {
    let engine = engine();
    let renderer = engine.renderer(TextureFormat::Bgra8UnormSrgb);
    assert!(!renderer.is_ready());
    assert_eq!(renderer.generation(), 0);

    engine.stage_gpu_input(Arc::new(PixelBuffer::gradient(64, 32)));
    engine.stage_gpu_lut(Arc::new(LutCube::identity(17).unwrap()));
    assert!(renderer.staging().has_pending());
    assert_eq!(renderer.staging().superseded_count(), 0);
}

#[test]
fn rapid_restaging_keeps_only_the_latest() {
    let engine = engine();
    let staging = engine.staging();
    for n in 2..=6 {
        engine.stage_gpu_lut(Arc::new(LutCube::identity(n).unwrap()));
    }
    assert_eq!(staging.superseded_count(), 4);
    // Nothing was ever uploaded, so there is nothing to re-stage.
    assert_eq!(staging.restage_committed(), 0);
    assert!(staging.has_pending());
}

#[test]
fn context_loss_before_creation_is_harmless() {
    let engine = engine();
    let mut renderer = engine.renderer(TextureFormat::Rgba8Unorm);
    engine.stage_gpu_grain(Arc::new(PixelBuffer::new(8, 8, PixelFormat::Rgba8)));
    renderer.on_context_lost();
    assert!(!renderer.is_ready());
    assert_eq!(renderer.frames_rendered(), 0);
    assert!(renderer.staging().has_pending());
}

#[test]
fn render_parameters_from_config_are_clamped() {
    let config = EngineConfig::from_json(
        r#"{ "render": { "intensity": 3.5, "grain_enabled": true, "grain_intensity": 0.4, "grain_scale": 50, "zoom": 0.01 } }"#,
    )
    .unwrap();
    let engine = LutEngine::new(config, Arc::new(lutcraft_color::MemoryAssetSource::new())).unwrap();
    let params = engine.render_params();
    assert_eq!(params.intensity, 1.0);
    assert_eq!(params.grain_scale, 10.0);
    assert_eq!(params.zoom, 0.1);
    assert_eq!(params.effective_grain(), 0.4);

    engine.set_grain(false, 0.9, 2.0);
    assert_eq!(engine.render_params().effective_grain(), 0.0);
    engine.set_transform(f32::NAN, 5.0, -0.5);
    let params = engine.render_params();
    assert_eq!(params.zoom, 1.0);
    assert_eq!(params.offset, [2.0, -0.5]);
}

#[test]
fn uniforms_carry_the_cube_domain() {
    let text = "LUT_3D_SIZE 2\nDOMAIN_MIN 0 0 0\nDOMAIN_MAX 4 2 1\n\
                0 0 0\n1 0 0\n0 1 0\n1 1 0\n0 0 1\n1 0 1\n0 1 1\n1 1 1\n";
    let cube = parse_cube_text(text).unwrap();
    let params = RenderParams {
        intensity: 0.5,
        ..RenderParams::default()
    };
    let scale = letterbox_scale((1920, 1080), (1080, 1080));
    let u = Uniforms::new(&params, scale, Uniforms::domain_of(&cube));
    assert_eq!(u.domain_max, [4.0, 2.0, 1.0, 1.0]);
    assert_eq!(u.intensity, 0.5);
    assert_eq!(u.scale[0], 1.0);
    assert!((u.scale[1] - 0.5625).abs() < 1e-6);
}

#[test]
fn lut_texels_follow_cube_order() {
    let cube = LutCube::from_fn(3, |r, g, b| [r as f32 * 0.5, g as f32 * 0.5, b as f32 * 0.5])
        .unwrap();
    // Round-trip through text first, as a loaded asset would be.
    let cube = parse_cube_text(&to_cube_text(&cube, None)).unwrap();
    let texels = cube_to_rgba16f(&cube);
    assert_eq!(texels.len(), 27 * 4);
    // Cell (r=1, g=2, b=0) is texel 1 + 2·3.
    let t = &texels[(1 + 2 * 3) * 4..(1 + 2 * 3) * 4 + 4];
    let values: Vec<f32> = t.iter().map(|h| h.to_f32()).collect();
    assert_eq!(values, vec![0.5, 1.0, 0.0, 1.0]);
}

#[test]
fn oversized_images_are_rejected_before_upload() {
    let image = PixelBuffer::new(4096, 16, PixelFormat::Rgba8);
    assert!(check_image_size(&image, 8192).is_ok());
    assert!(matches!(
        check_image_size(&image, 2048),
        Err(GpuError::InvalidUpload(_))
    ));
}
