//! LutCraft - apply, convert and inspect 3D LUTs from the command line.

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{ApplyArgs, Cli, Command, ConvertArgs, ExtractLeicaArgs, InfoArgs};
use lutcraft_color::{
    encode_binary, encode_tiled, parse_leica_data, to_cube_text, FsAssetSource, LutFormat,
    TileLayout,
};
use lutcraft_core::{LutCube, PixelBuffer, PixelFormat};
use lutcraft_engine::{EngineConfig, LutEngine};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Apply(ApplyArgs { lut, input, output }) => {
            run_apply(config, &lut, &input, &output)
        }
        Command::Convert(ConvertArgs { lut, output }) => run_convert(config, &lut, &output),
        Command::ExtractLeica(ExtractLeicaArgs { input, output }) => {
            run_extract_leica(&input, &output)
        }
        Command::Info(InfoArgs { lut }) => run_info(config, &lut),
    }
}

/// Build an engine that can see `lut` and return the asset id to ask it for.
///
/// With a configured asset root the argument is an id; otherwise it is a file
/// path and its directory becomes the root.
fn open_lut(config: EngineConfig, lut: &str) -> Result<(LutEngine, String)> {
    if config.asset_root.is_some() {
        return Ok((LutEngine::from_config(config)?, lut.to_string()));
    }
    let path = Path::new(lut);
    let id = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a LUT file path: {}", lut))?
        .to_string();
    let root = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let engine = LutEngine::new(config, Arc::new(FsAssetSource::new(root)))?;
    Ok((engine, id))
}

fn load_cube(config: EngineConfig, lut: &str) -> Result<(LutEngine, Arc<LutCube>)> {
    let (engine, id) = open_lut(config, lut)?;
    let cube = engine
        .parse_lut(&id)
        .with_context(|| format!("parsing {}", lut))?;
    Ok((engine, cube))
}

fn run_apply(config: EngineConfig, lut: &str, input: &Path, output: &Path) -> Result<()> {
    let (engine, cube) = load_cube(config, lut)?;

    let decoded = image::open(input).with_context(|| format!("reading {}", input.display()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let source = PixelBuffer::from_raw(width, height, PixelFormat::Rgba8, rgba.into_raw())?;

    let started = Instant::now();
    let graded = engine.apply_cpu(&source, &cube);
    info!(
        "applied {} (N = {}) to {}x{} image on {} worker(s) in {:?}",
        lut,
        cube.size(),
        width,
        height,
        engine.workers(),
        started.elapsed()
    );

    let out = image::RgbaImage::from_raw(width, height, graded.into_raw())
        .context("output buffer does not match image size")?;
    out.save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!("wrote {}", output.display());
    Ok(())
}

fn run_convert(config: EngineConfig, lut: &str, output: &Path) -> Result<()> {
    let (_, cube) = load_cube(config, lut)?;
    write_cube(&cube, output)
}

fn run_extract_leica(input: &Path, output: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let cube = parse_leica_data(&bytes).with_context(|| format!("decoding {}", input.display()))?;
    write_cube(&cube, output)
}

/// Encode `cube` in the format implied by the output extension.
fn write_cube(cube: &LutCube, output: &Path) -> Result<()> {
    let name = output.to_string_lossy();
    let bytes = match LutFormat::from_extension(&name) {
        Some(LutFormat::Binary) => encode_binary(cube),
        Some(LutFormat::Text) => {
            let title = output.file_stem().and_then(|s| s.to_str());
            to_cube_text(cube, title).into_bytes()
        }
        Some(LutFormat::Image) => {
            if !name.to_ascii_lowercase().ends_with(".png") {
                bail!("image LUTs are written as lossless .png only");
            }
            let (w, h, rgba) = encode_tiled(cube, TileLayout::HorizontalStrip)
                .context("cube cannot be tiled as a horizontal strip")?;
            let img = image::RgbaImage::from_raw(w, h, rgba)
                .context("tiled image does not match its size")?;
            img.save(output)
                .with_context(|| format!("writing {}", output.display()))?;
            info!("wrote {} ({}x{})", output.display(), w, h);
            return Ok(());
        }
        _ => bail!("cannot write LUTs as {}", output.display()),
    };
    std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    info!("wrote {} ({} bytes, N = {})", output.display(), bytes.len(), cube.size());
    Ok(())
}

fn run_info(config: EngineConfig, lut: &str) -> Result<()> {
    let (engine, id) = open_lut(config, lut)?;
    let (resolved, format) = engine.parser().resolve(&id)?;
    let cube = engine
        .parse_lut(&id)
        .with_context(|| format!("parsing {}", lut))?;
    println!("asset:   {}", resolved);
    println!(
        "format:  {}",
        format.map_or_else(|| "sniffed".to_string(), |f| format!("{:?}", f))
    );
    println!("size:    {0}x{0}x{0} ({1} cells)", cube.size(), cube.cell_count());
    println!("domain:  {:?} .. {:?}", cube.domain_min(), cube.domain_max());
    println!("memory:  {} bytes", cube.memory_size());
    Ok(())
}
