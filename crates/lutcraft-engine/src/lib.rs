//! LutCraft Engine - the context object hosts talk to.
//!
//! [`LutEngine`] ties together the LUT parser, the CPU worker pool, the
//! cube and thumbnail caches, background preload and the GPU staging area.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod preload;

pub use cache::{SingleFlight, SourceId, ThumbnailCache};
pub use config::EngineConfig;
pub use engine::LutEngine;
pub use error::{EngineError, EngineResult};
pub use preload::{PreloadEvent, PreloadHandle, PreloadSummary};
