//! # Conversion Engine
//!
//! Runs one input clip through decode, trim, alpha keying, frame output and encoding.

pub mod engine;

pub use engine::{ConversionEngine, ConversionReport};
