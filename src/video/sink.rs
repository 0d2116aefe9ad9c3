use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::types::CompositedFrame;

const SCRATCH_PREFIX: &str = "alpha-keyer-";

/// Report progress every this many written frames
const PROGRESS_INTERVAL: u64 = 10;

/// Uniquely named temporary directory holding the intermediate frame images
///
/// The directory is deleted when this value is dropped, whatever the outcome of the
/// run. [`ScratchDir::close`] deletes it explicitly and reports failures.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a scratch directory under `root`, or the system temp dir when `None`
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        debug!("Created scratch directory {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            warn!("Failed to remove scratch directory {:?}: {}", path, e);
            e
        })?;
        debug!("Removed scratch directory {:?}", path);
        Ok(())
    }
}

/// File name for the frame at output index `index`
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{:05}.png", index)
}

/// Writes composited frames as numbered PNG files
pub struct FrameSink {
    dir: PathBuf,
    written: u64,
}

impl FrameSink {
    pub fn new(scratch: &ScratchDir) -> Self {
        Self::in_dir(scratch.path())
    }

    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            written: 0,
        }
    }

    /// Save `frame` losslessly as `frame_{index:05}.png`
    pub fn write(&mut self, index: u64, frame: &CompositedFrame) -> Result<PathBuf> {
        let path = self.dir.join(frame_file_name(index));

        frame
            .as_image()
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| VideoError::write_failed(&path, e))?;

        self.written += 1;
        if self.written % PROGRESS_INTERVAL == 0 {
            info!("  {} frames...", self.written);
        }

        Ok(path)
    }

    /// Frames written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// printf-style input pattern matching the written file names
    pub fn pattern(&self) -> PathBuf {
        self.dir.join("frame_%05d.png")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeyerError;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    fn gradient_frame() -> CompositedFrame {
        CompositedFrame::new(RgbaImage::from_fn(8, 4, |x, y| {
            Rgba([x as u8 * 30, y as u8 * 60, 7, (x * 32 + y) as u8])
        }))
    }

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(0), "frame_00000.png");
        assert_eq!(frame_file_name(7), "frame_00007.png");
        assert_eq!(frame_file_name(12345), "frame_12345.png");
    }

    #[test]
    fn test_written_names_are_contiguous() {
        let dir = tempdir().unwrap();
        let mut sink = FrameSink::in_dir(dir.path());
        let frame = gradient_frame();

        for i in 0..23 {
            sink.write(i, &frame).unwrap();
        }
        assert_eq!(sink.written(), 23);

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let expected: Vec<String> = (0..23).map(frame_file_name).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_alpha_survives_png_roundtrip() {
        let dir = tempdir().unwrap();
        let mut sink = FrameSink::in_dir(dir.path());
        let frame = gradient_frame();

        let path = sink.write(0, &frame).unwrap();
        let loaded = image::open(&path).unwrap();
        assert!(loaded.color().has_alpha());
        assert_eq!(&loaded.to_rgba8(), frame.as_image());
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let mut sink = FrameSink::in_dir(dir.path().join("gone"));
        let err = sink.write(0, &gradient_frame()).unwrap_err();
        assert!(matches!(err, KeyerError::Video(VideoError::WriteFailed { .. })));
    }

    #[test]
    fn test_scratch_dir_lifecycle() {
        let root = tempdir().unwrap();
        let scratch = ScratchDir::create(Some(root.path())).unwrap();
        let path = scratch.path().to_path_buf();

        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));

        let mut sink = FrameSink::new(&scratch);
        sink.write(0, &gradient_frame()).unwrap();
        assert_eq!(sink.pattern(), path.join("frame_%05d.png"));

        scratch.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let root = tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(Some(root.path())).unwrap();
            std::fs::write(scratch.path().join("frame_00000.png"), b"x").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
