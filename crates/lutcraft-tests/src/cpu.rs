//! Integration tests for the CPU transform.
//!
//! Cubes are built in memory or decoded through the format parsers, then
//! applied through the free functions and the worker pool.

use std::sync::{Arc, Barrier};
use std::time::Duration;

use lutcraft_color::{apply, apply_raw, apply_with_cancel, ApplyError, CancelToken, WorkerPool};
use lutcraft_core::{LutCube, PixelBuffer, PixelFormat};
use proptest::prelude::*;

/// Every 8-bit level on each channel, with the channels offset so that red,
/// green and blue differ within a pixel.
fn all_levels() -> PixelBuffer {
    let mut data = Vec::with_capacity(256 * 4 * 4);
    for row in 0..4u32 {
        for x in 0..256u32 {
            let r = x as u8;
            let g = ((x + 85 * row) % 256) as u8;
            let b = (255 - x) as u8;
            data.extend_from_slice(&[r, g, b, (x / 2) as u8]);
        }
    }
    PixelBuffer::from_raw(256, 4, PixelFormat::Rgba8, data).unwrap()
}

fn scrambled(n: usize) -> LutCube {
    let m = (n - 1) as f32;
    LutCube::from_fn(n, |r, g, b| {
        [
            ((r * 7 + g * 3 + b) % n) as f32 / m,
            ((g * 5 + b) % n) as f32 / m,
            ((b * 3 + r * 2 + 1) % n) as f32 / m,
        ]
    })
    .unwrap()
}

fn pixel(rgba: [u8; 4]) -> PixelBuffer {
    PixelBuffer::from_raw(1, 1, PixelFormat::Rgba8, rgba.to_vec()).unwrap()
}

#[test]
fn identity_cube_reproduces_input_within_one_level() {
    let source = all_levels();
    let out = apply(&source, &LutCube::identity(86).unwrap(), 4);
    for (i, (o, s)) in out.data().iter().zip(source.data()).enumerate() {
        if i % 4 == 3 {
            assert_eq!(o, s, "alpha changed at byte {}", i);
        } else {
            assert!(
                (*o as i16 - *s as i16).abs() <= 1,
                "byte {}: {} -> {}",
                i,
                s,
                o
            );
        }
    }
}

#[test]
fn identity_cube_is_exact_on_grid_levels() {
    // 255 / 17 = 15, so every multiple of 15 sits on a cell centre.
    let levels: Vec<u8> = (0..=17).map(|k| (k * 15) as u8).collect();
    let data: Vec<u8> = levels
        .iter()
        .flat_map(|&v| [v, 255 - v, v, 200])
        .collect();
    let source = PixelBuffer::from_raw(levels.len() as u32, 1, PixelFormat::Rgba8, data).unwrap();
    let out = apply(&source, &LutCube::identity(18).unwrap(), 3);
    assert_eq!(out, source);
}

#[test]
fn two_point_identity_keeps_red() {
    let out = apply(&pixel([255, 0, 0, 255]), &LutCube::identity(2).unwrap(), 1);
    assert_eq!(out.data(), &[255, 0, 0, 255]);
}

#[test]
fn two_point_invert_turns_red_cyan() {
    let invert = LutCube::from_fn(2, |r, g, b| {
        [1.0 - r as f32, 1.0 - g as f32, 1.0 - b as f32]
    })
    .unwrap();
    let out = apply(&pixel([255, 0, 0, 255]), &invert, 1);
    assert_eq!(out.data(), &[0, 255, 255, 255]);
}

#[test]
fn extreme_bytes_select_corner_cells() {
    let n = 9;
    let cube = LutCube::from_fn(n, |r, g, b| {
        [r as f32 / 100.0, g as f32 / 100.0, b as f32 / 100.0]
    })
    .unwrap();
    let low = apply(&pixel([0, 0, 0, 1]), &cube, 1);
    assert_eq!(low.data(), &[0, 0, 0, 1]);
    let high = apply(&pixel([255, 255, 255, 2]), &cube, 1);
    // Cell 8 stores 0.08 -> round(20.4) = 20.
    assert_eq!(high.data(), &[20, 20, 20, 2]);
}

#[test]
fn values_outside_the_domain_clamp_to_the_edge() {
    let n = 5;
    let cube = LutCube::from_fn(n, |r, _, _| [r as f32 / 4.0, 0.0, 0.0])
        .unwrap()
        .with_domain([0.25; 3], [0.75; 3])
        .unwrap();
    let dark = apply(&pixel([10, 0, 0, 255]), &cube, 1);
    assert_eq!(dark.data()[0], 0);
    let bright = apply(&pixel([250, 0, 0, 255]), &cube, 1);
    assert_eq!(bright.data()[0], 255);
    // 128/255 sits at the domain centre, cell 2 of 0..=4.
    let mid = apply(&pixel([128, 0, 0, 255]), &cube, 1);
    assert_eq!(mid.data()[0], 128);
}

#[test]
fn out_of_range_samples_clamp_to_bytes() {
    let cube = LutCube::from_fn(2, |_, _, _| [1.7, -0.3, 0.5]).unwrap();
    let out = apply(&pixel([12, 34, 56, 78]), &cube, 1);
    assert_eq!(out.data(), &[255, 0, 128, 78]);
}

#[test]
fn rgb_sources_keep_their_format() {
    let source = PixelBuffer::from_raw(2, 1, PixelFormat::Rgb8, vec![255, 0, 0, 0, 0, 255]).unwrap();
    let out = apply(&source, &scrambled(2), 2);
    assert_eq!(out.format, PixelFormat::Rgb8);
    assert_eq!(out.data().len(), 6);
}

#[test]
fn lane_counts_give_identical_output() {
    let source = all_levels();
    let cube = scrambled(17);
    let one = apply(&source, &cube, 1);
    for lanes in [2, 8, 1024, 5000] {
        assert_eq!(apply(&source, &cube, lanes), one, "lanes = {}", lanes);
    }
}

#[test]
fn worker_pool_matches_free_function() {
    let pool = WorkerPool::new(3).unwrap();
    assert_eq!(pool.threads(), 3);
    let source = PixelBuffer::gradient(64, 32);
    let cube = scrambled(9);
    let pooled = pool.apply(&source, &cube, &CancelToken::new()).unwrap();
    assert_eq!(pooled, apply(&source, &cube, 1));
}

#[test]
fn cancelled_transform_returns_no_output() {
    let token = CancelToken::new();
    token.cancel();
    let result = apply_with_cancel(&PixelBuffer::gradient(32, 32), &scrambled(4), 4, &token);
    assert_eq!(result, Err(ApplyError::Cancelled));
}

#[test]
fn cancel_from_another_thread_stops_a_running_transform() {
    let pool = WorkerPool::new(2).unwrap();
    let source = PixelBuffer::gradient(4096, 2048);
    let cube = scrambled(33);
    let token = CancelToken::new();
    let barrier = Arc::new(Barrier::new(2));

    let canceller = {
        let token = token.clone();
        let barrier = Arc::clone(&barrier);
        std::thread::spawn(move || {
            barrier.wait();
            std::thread::sleep(Duration::from_millis(2));
            token.cancel();
        })
    };
    barrier.wait();
    let result = pool.apply(&source, &cube, &token);
    canceller.join().unwrap();

    assert_eq!(result, Err(ApplyError::Cancelled));
    // The token stays fired; a retry needs a fresh one.
    assert!(token.is_cancelled());
    assert!(pool.apply(&source, &cube, &CancelToken::new()).is_ok());
}

#[test]
fn raw_buffers_are_checked_against_their_size() {
    let cube = LutCube::identity(2).unwrap();
    let err = apply_raw(&[0u8; 7], 2, 1, PixelFormat::Rgba8, &cube, 1).unwrap_err();
    assert!(matches!(err, ApplyError::Precondition(_)));

    let out = apply_raw(&[255, 0, 0, 9, 0, 0, 255, 9], 2, 1, PixelFormat::Rgba8, &cube, 2).unwrap();
    assert_eq!(out.data(), &[255, 0, 0, 9, 0, 0, 255, 9]);
}

#[test]
fn empty_image_is_a_no_op() {
    let source = PixelBuffer::new(0, 0, PixelFormat::Rgba8);
    let out = apply(&source, &scrambled(3), 8);
    assert_eq!(out.pixel_count(), 0);
}

proptest! {
    #[test]
    fn lane_count_never_changes_output(
        pixels in proptest::collection::vec(any::<u8>(), 4..2048),
        n in 2usize..12,
        lanes in 1usize..64,
    ) {
        let len = pixels.len() / 4 * 4;
        let source = PixelBuffer::from_raw(
            (len / 4) as u32,
            1,
            PixelFormat::Rgba8,
            pixels[..len].to_vec(),
        )
        .unwrap();
        let cube = scrambled(n);
        prop_assert_eq!(apply(&source, &cube, lanes), apply(&source, &cube, 1));
    }

    #[test]
    fn alpha_is_always_preserved(px in any::<[u8; 4]>(), n in 2usize..20) {
        let out = apply(&pixel(px), &scrambled(n), 1);
        prop_assert_eq!(out.data()[3], px[3]);
    }
}
