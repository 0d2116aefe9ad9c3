//! # Video Module
//!
//! Decoding, trimming, frame output and encoding around external ffmpeg tools.

pub mod encoder;
pub mod loader;
pub mod sink;
pub mod trim;
pub mod types;

pub use encoder::{EncodedVideo, VideoEncoder};
pub use loader::{FrameStream, VideoLoader, VideoMetadata, VideoSource};
pub use sink::{FrameSink, ScratchDir};
pub use trim::{TrimDecision, TrimWindow, TrimmedFrames};
pub use types::{CompositedFrame, Frame};
