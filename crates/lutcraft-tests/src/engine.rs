//! Integration tests for the engine: parse caching, thumbnails and preload.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use lutcraft_color::{
    encode_binary, to_cube_text, AssetSource, FsAssetSource, LutFormat, ParseError, TileLayout,
};
use lutcraft_core::{LutCube, PixelBuffer, PixelFormat};
use lutcraft_engine::{EngineConfig, EngineError, LutEngine, PreloadEvent};

/// Filesystem library that counts reads per call.
struct CountingFs {
    inner: FsAssetSource,
    reads: AtomicUsize,
}

impl AssetSource for CountingFs {
    fn read(&self, asset_id: &str) -> Result<Vec<u8>, ParseError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(10));
        self.inner.read(asset_id)
    }

    fn exists(&self, asset_id: &str) -> bool {
        self.inner.exists(asset_id)
    }
}

struct Library {
    dir: PathBuf,
    source: Arc<CountingFs>,
}

impl Library {
    /// A temp directory holding a few filters from two vendors.
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("lutcraft-engine-{}", uuid::Uuid::new_v4()));
        let write = |id: &str, bytes: &[u8]| {
            let path = dir.join(id);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, bytes).unwrap();
        };
        write(
            "Leica/Classic.cube",
            to_cube_text(&LutCube::identity(5).unwrap(), Some("Classic")).as_bytes(),
        );
        write("Leica/Mono.bin", &encode_binary(&mono()));
        write("Fuji/Invert.cube", to_cube_text(&invert(), None).as_bytes());
        write("Fuji/Broken.cube", b"LUT_3D_SIZE 3\n0 0 0\n");

        let source = Arc::new(CountingFs {
            inner: FsAssetSource::new(&dir),
            reads: AtomicUsize::new(0),
        });
        Self { dir, source }
    }

    fn engine(&self, lanes: usize) -> LutEngine {
        let config = EngineConfig {
            lanes,
            preload_batch: 2,
            ..EngineConfig::default()
        };
        LutEngine::new(config, self.source.clone()).unwrap()
    }

    /// Write `count` copies of the invert cube as `Batch/<i>.cube`.
    fn add_batch(&self, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                let id = format!("Batch/{}", i);
                let path = self.dir.join(format!("{}.cube", id));
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, to_cube_text(&invert(), None)).unwrap();
                id
            })
            .collect()
    }

    fn reads(&self) -> usize {
        self.source.reads.load(Ordering::SeqCst)
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn invert() -> LutCube {
    LutCube::from_fn(2, |r, g, b| [1.0 - r as f32, 1.0 - g as f32, 1.0 - b as f32]).unwrap()
}

fn mono() -> LutCube {
    LutCube::from_fn(4, |r, g, b| {
        let y = (r + g + b) as f32 / 9.0;
        [y, y, y]
    })
    .unwrap()
}

fn red() -> PixelBuffer {
    PixelBuffer::from_raw(1, 1, PixelFormat::Rgba8, vec![255, 0, 0, 255]).unwrap()
}

#[test]
fn repeated_parse_returns_the_same_cube() {
    let library = Library::new();
    let engine = library.engine(2);
    let a = engine.parse_lut("Leica/Classic").unwrap();
    let b = engine.parse_lut("Leica/Classic").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(library.reads(), 1);
    assert_eq!(engine.cached_lut_count(), 1);
}

#[test]
fn concurrent_first_access_parses_once() {
    let library = Library::new();
    let engine = Arc::new(library.engine(2));
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                engine.parse_lut("Leica/Mono").unwrap()
            })
        })
        .collect();
    let cubes: Vec<Arc<LutCube>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(library.reads(), 1);
    assert!(cubes.iter().all(|c| Arc::ptr_eq(c, &cubes[0])));
    assert_eq!(*cubes[0], mono());
}

#[test]
fn failed_parse_is_retried() {
    let library = Library::new();
    let engine = library.engine(1);
    for _ in 0..2 {
        let err = engine.parse_lut("Fuji/Broken").unwrap_err();
        assert!(matches!(err, EngineError::Parse(ParseError::Malformed(_))));
    }
    assert_eq!(library.reads(), 2);
    assert!(engine.cached_lut("Fuji/Broken").is_none());
}

#[test]
fn engine_from_config_reads_the_asset_root() {
    let library = Library::new();
    let json = format!(
        r#"{{ "lanes": 2, "asset_root": {:?}, "layouts": {{ "vendors": [["Fuji/", {{ "kind": "vertical_strip" }}]] }} }}"#,
        library.dir.to_string_lossy()
    );
    let config = EngineConfig::from_json(&json).unwrap();
    assert_eq!(config.layouts.layout_for("Fuji/Film"), TileLayout::VerticalStrip);

    let engine = LutEngine::from_config(config).unwrap();
    assert_eq!(engine.workers(), 2);
    assert_eq!(
        engine.parser().resolve("Fuji/Invert").unwrap().1,
        Some(LutFormat::Text)
    );
    let cube = engine.parse_lut("Fuji/Invert").unwrap();
    let out = engine.apply_cpu(&red(), &cube);
    assert_eq!(out.data(), &[0, 255, 255, 255]);
}

#[test]
fn cpu_apply_is_independent_of_worker_count() {
    let library = Library::new();
    let image = PixelBuffer::test_pattern(97, 31);
    let outputs: Vec<PixelBuffer> = [1, 2, 8]
        .into_iter()
        .map(|lanes| {
            let engine = library.engine(lanes);
            let cube = engine.parse_lut("Leica/Mono").unwrap();
            engine.apply_cpu(&image, &cube)
        })
        .collect();
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], outputs[2]);
}

#[test]
fn thumbnails_follow_the_source_image() {
    let library = Library::new();
    let engine = library.engine(2);
    assert_eq!(engine.thumbnail("Fuji/Invert").unwrap_err(), EngineError::NoSource);

    let first = engine.set_source(Arc::new(red()));
    let a = engine.thumbnail("Fuji/Invert").unwrap();
    assert_eq!(a.data(), &[0, 255, 255, 255]);
    assert!(Arc::ptr_eq(&a, &engine.thumbnail("Fuji/Invert").unwrap()));

    let blue = PixelBuffer::from_raw(1, 1, PixelFormat::Rgba8, vec![0, 0, 255, 7]).unwrap();
    let second = engine.set_source(Arc::new(blue));
    assert_ne!(first, second);
    assert!(engine.cached_thumbnail("Fuji/Invert").is_none());
    assert_eq!(engine.thumbnail("Fuji/Invert").unwrap().data(), &[255, 255, 0, 7]);
    // The cube itself stayed cached across the source change.
    assert_eq!(library.reads(), 1);
}

#[test]
fn preload_fills_both_caches_in_batches() {
    let library = Library::new();
    let engine = library.engine(2);
    engine.set_source(Arc::new(PixelBuffer::gradient(16, 16)));

    let ids = ["Leica/Classic", "Leica/Mono", "Fuji/Invert", "Fuji/Broken"];
    let handle = engine.preload(ids).unwrap();
    let events: Vec<PreloadEvent> = handle.events().iter().collect();
    let summary = handle.wait();

    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 1);
    assert!(!summary.cancelled && !summary.superseded);

    let batches = events
        .iter()
        .filter(|e| matches!(e, PreloadEvent::Batch { .. }))
        .count();
    assert_eq!(batches, 2);
    assert_eq!(engine.cached_thumbnail_count(), 3);
    assert_eq!(engine.cached_lut_count(), 3);

    // Served from cache: no further reads.
    let reads = library.reads();
    for id in &ids[..3] {
        engine.thumbnail(id).unwrap();
    }
    assert_eq!(library.reads(), reads);
}

#[test]
fn preload_skips_cached_entries() {
    let library = Library::new();
    let engine = library.engine(2);
    engine.set_source(Arc::new(red()));
    engine.thumbnail("Fuji/Invert").unwrap();

    let summary = engine
        .preload(["Fuji/Invert", "Leica/Classic"])
        .unwrap()
        .wait();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 1);
}

#[test]
fn preload_cancelled_between_batches_stops_early() {
    let library = Library::new();
    let ids = library.add_batch(6);
    let config = EngineConfig {
        lanes: 1,
        preload_batch: 1,
        ..EngineConfig::default()
    };
    let engine = LutEngine::new(config, library.source.clone()).unwrap();
    engine.set_source(Arc::new(red()));

    let handle = engine.preload(ids).unwrap();
    let first = handle.events().recv().unwrap();
    assert!(matches!(&first, PreloadEvent::Batch { ids, .. } if ids.len() == 1));
    handle.cancel();
    let summary = handle.wait();

    assert!(summary.cancelled);
    assert!(summary.completed >= 1);
    assert!(summary.completed < 6, "completed {}", summary.completed);
    assert_eq!(summary.failed, 0);
    // Only finished entries were stored; nothing half-rendered lingers.
    assert_eq!(engine.cached_thumbnail_count(), summary.completed);
    // A render cancelled after its parse still leaves the cube cached.
    let cubes = engine.cached_lut_count();
    assert!(cubes == summary.completed || cubes == summary.completed + 1);
}
