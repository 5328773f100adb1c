//! Command-line parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "lutcraft")]
#[command(author, version, about = "Apply, convert and inspect 3D LUTs")]
#[command(long_about = "
Apply, convert and inspect 3D colour lookup tables.

A <LUT> argument is a file path, or an asset id when the config sets asset_root.
Set RUST_LOG=debug for detailed logs.

Examples:
  lutcraft apply Classic.cube photo.jpg graded.png
  lutcraft -c engine.json apply Leica/Classic photo.jpg graded.png
  lutcraft convert Classic.cube Classic.bin
  lutcraft extract-leica dump.data Leica.cube
  lutcraft info Classic.bin
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Engine config (JSON)
    #[arg(short, long, global = true, value_name = "ENGINE_JSON")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Apply a LUT to an image on the CPU
    #[command(visible_alias = "a")]
    Apply(ApplyArgs),

    /// Re-encode a LUT as .bin, .cube or .png
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// Convert a Leica .data dump to another LUT format
    #[command(name = "extract-leica")]
    ExtractLeica(ExtractLeicaArgs),

    /// Print LUT metadata
    #[command(visible_alias = "i")]
    Info(InfoArgs),
}

#[derive(Args, Debug, PartialEq)]
pub struct ApplyArgs {
    /// LUT path or asset id
    pub lut: String,

    /// Input image
    pub input: PathBuf,

    /// Output image
    pub output: PathBuf,
}

#[derive(Args, Debug, PartialEq)]
pub struct ConvertArgs {
    /// LUT path or asset id
    pub lut: String,

    /// Output file; the extension picks the encoding
    pub output: PathBuf,
}

#[derive(Args, Debug, PartialEq)]
pub struct ExtractLeicaArgs {
    /// Leica .data dump
    pub input: PathBuf,

    /// Output file; the extension picks the encoding
    pub output: PathBuf,
}

#[derive(Args, Debug, PartialEq)]
pub struct InfoArgs {
    /// LUT path or asset id
    pub lut: String,
}
