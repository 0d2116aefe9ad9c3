use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::Result,
    matte::AlphaMatte,
    video::{
        FrameSink, ScratchDir, TrimWindow, VideoEncoder, VideoLoader, VideoMetadata, VideoSource,
    },
};

/// Summary of a finished conversion
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub output: PathBuf,
    pub source: VideoMetadata,
    pub trim: TrimWindow,
    pub frames_emitted: u64,
    pub file_size: u64,
}

/// Orchestrates a single black-background to alpha-video conversion
///
/// The engine follows a strictly forward pipeline:
/// 1. Open - probe the input and prepare a decoder
/// 2. Trim - turn the configured time window into frame boundaries
/// 3. Key - threshold and feather each kept frame into an RGBA image
/// 4. Write - save each RGBA frame as a numbered PNG in a scratch directory
/// 5. Encode - run ffmpeg over the PNG sequence, then remove the scratch directory
///
/// The scratch directory is removed on every exit path, including failures while
/// decoding or writing.
pub struct ConversionEngine {
    config: Config,
    loader: VideoLoader,
    matte: AlphaMatte,
    encoder: VideoEncoder,
}

impl ConversionEngine {
    /// Create a new conversion engine with the given configuration
    pub fn new(config: Config) -> Self {
        let loader = VideoLoader::new(&config.tools.ffmpeg, &config.tools.ffprobe);
        let matte = AlphaMatte::new(&config.matte);
        let encoder = VideoEncoder::new(&config.tools.ffmpeg);
        Self {
            config,
            loader,
            matte,
            encoder,
        }
    }

    /// Replace the encoder, e.g. to run a different ffmpeg build for encoding only
    pub fn with_encoder(mut self, encoder: VideoEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Convert `input` into an alpha-channel WebM at `output`
    pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<ConversionReport> {
        let input = input.as_ref();
        let output = output.as_ref();

        self.config.validate()?;

        info!("🎬 Converting {:?} -> {:?}", input, output);

        // Step 1: Open
        let source = self.loader.open(input)?;
        let metadata = source.metadata().clone();
        info!(
            "Video: {}x{} @ {:.1}fps, {} frames",
            metadata.width, metadata.height, metadata.fps, metadata.frame_count
        );

        let scratch = ScratchDir::create(self.config.tools.scratch_root.as_deref())?;
        info!("Processing frames to {:?}...", scratch.path());

        // Step 2: Trim
        let trim = &self.config.trim;
        let window = TrimWindow::from_seconds(metadata.fps, trim.start_sec, trim.end_sec);
        info!(
            "Trimming: frame {} – {} ({}s – {}s)",
            window.start_frame, window.end_frame, trim.start_sec, trim.end_sec
        );
        if window.expected_frames() == 0 {
            warn!("Trim window selects no frames; the encoder will have nothing to encode");
        }

        // Steps 3 and 4: Key and Write
        let frames_emitted = self.write_frames(&source, window, &scratch)?;
        info!("Processed {} frames. Encoding WebM with alpha...", frames_emitted);

        // Step 5: Encode
        ensure_parent_dir(output)?;
        let pattern = FrameSink::new(&scratch).pattern();
        let encoded = self.encoder.encode(metadata.fps, &pattern, output, frames_emitted);
        let cleanup = scratch.close();
        let encoded = encoded?;
        cleanup?;

        Ok(ConversionReport {
            output: encoded.path,
            source: metadata,
            trim: window,
            frames_emitted,
            file_size: encoded.file_size,
        })
    }

    /// Decode, key and save every frame inside `window`; returns the number written
    fn write_frames(
        &self,
        source: &VideoSource,
        window: TrimWindow,
        scratch: &ScratchDir,
    ) -> Result<u64> {
        let mut sink = FrameSink::new(scratch);
        let mut frames = window.apply(source.frames()?);

        for item in frames.by_ref() {
            let (index, frame) = item?;
            let keyed = self.matte.apply(&frame);
            sink.write(index, &keyed)?;
        }

        debug!(
            "Decoded {} source frames, kept {} (threshold {}, feather {})",
            frames.decoded(),
            sink.written(),
            self.matte.threshold(),
            self.matte.feather_radius()
        );

        // Dropping the stream stops the decoder before the encoder starts.
        drop(frames);
        Ok(sink.written())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
