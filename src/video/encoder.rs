use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{Result, VideoError};

/// How much of the encoder's stderr is kept for error reports, in characters
pub const STDERR_TAIL_CHARS: usize = 2000;

/// Represents an encoded video output
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_count: u64,
    pub file_size: u64,
}

/// Encodes a numbered PNG sequence into VP9 WebM with an alpha plane
pub struct VideoEncoder {
    program: PathBuf,
}

impl VideoEncoder {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the encoder program runs at all
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Full argument list passed to ffmpeg
    ///
    /// `yuva420p` is what keeps the alpha plane; any other pixel format silently
    /// drops transparency. libvpx refuses alt-ref frames when encoding alpha.
    pub fn build_args(fps: f64, pattern: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-framerate".into(),
            fps.to_string().into(),
            "-i".into(),
            pattern.as_os_str().to_owned(),
        ];
        args.extend(
            [
                "-c:v",
                "libvpx-vp9",
                "-pix_fmt",
                "yuva420p",
                "-b:v",
                "0",
                "-crf",
                "15",
                "-auto-alt-ref",
                "0",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Run the encoder over `pattern` and block until it exits
    pub fn encode(
        &self,
        fps: f64,
        pattern: &Path,
        output: &Path,
        frame_count: u64,
    ) -> Result<EncodedVideo> {
        if fps <= 0.0 || !fps.is_finite() {
            return Err(VideoError::InvalidParameters {
                details: format!("frame rate must be positive, got {}", fps),
            }
            .into());
        }

        let args = Self::build_args(fps, pattern, output);
        debug!("Running {} {:?}", self.program.display(), args);

        let output_result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| VideoError::EncoderUnavailable {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            let stderr_tail = tail_chars(&stderr, STDERR_TAIL_CHARS).to_string();
            return Err(VideoError::EncodingFailed {
                status: output_result.status.to_string(),
                stderr_tail,
            }
            .into());
        }

        let file_size = std::fs::metadata(output)?.len();
        info!("Encoded {} frames into {:?}", frame_count, output);

        Ok(EncodedVideo {
            path: output.to_path_buf(),
            frame_count,
            file_size,
        })
    }
}

impl Default for VideoEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// The last `max_chars` characters of `text`
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((offset, _)) => &text[offset..],
        None => text,
    }
}
