//! # Alpha-Keyer
//!
//! Turn a video clip shot against black into a WebM with a real alpha channel.
//!
//! Every frame's brightness (the maximum of its colour channels) is compared with a
//! threshold: darker pixels become transparent, the rest stay opaque. The resulting
//! mask can be feathered with a small Gaussian blur, the clip is trimmed to a time
//! window, and the frames are re-encoded with VP9 in `yuva420p` through ffmpeg.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alpha_keyer::{config::Config, conversion::ConversionEngine};
//!
//! # fn main() -> anyhow::Result<()> {
//! let engine = ConversionEngine::new(Config::default());
//! let report = engine.convert("assets/intro.mp4", "assets/intro-alpha.webm")?;
//! println!("{} frames, {} bytes", report.frames_emitted, report.file_size);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - ffprobe/ffmpeg decoding, trim window, PNG scratch frames, encoding
//! - [`matte`] - brightness threshold mask and feathering
//! - [`conversion`] - the end-to-end pipeline
//! - [`config`] - configuration management
//!
//! `ffmpeg` and `ffprobe` must be installed; their locations are configurable through
//! [`config::ToolConfig`].

pub mod config;
pub mod conversion;
pub mod error;
pub mod matte;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    conversion::{ConversionEngine, ConversionReport},
    error::{KeyerError, Result},
    matte::AlphaMatte,
};
