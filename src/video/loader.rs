use std::ffi::OsString;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::types::Frame;

/// Source video properties reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Advertised frame count; informational only, may be estimated
    pub frame_count: i64,
    pub duration: f64,
    pub codec: String,
}

/// Opens video files through the external ffprobe/ffmpeg tools
#[derive(Debug, Clone)]
pub struct VideoLoader {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl VideoLoader {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(ffmpeg: P, ffprobe: Q) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Probe `path` and prepare it for sequential decoding
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<VideoSource> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(VideoError::open_failed(path, "file does not exist").into());
        }

        let metadata = self.load_metadata(path)?;
        debug!("Opened {:?}: codec {}, {:.3}s", path, metadata.codec, metadata.duration);

        Ok(VideoSource {
            path: path.to_path_buf(),
            ffmpeg: self.ffmpeg.clone(),
            metadata,
        })
    }

    fn load_metadata(&self, path: &Path) -> Result<VideoMetadata> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                VideoError::open_failed(path, format!("failed to run {}: {}", self.ffprobe.display(), e))
            })?;

        if !output.status.success() {
            return Err(VideoError::open_failed(
                path,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )
            .into());
        }

        parse_probe_output(&output.stdout).map_err(|reason| VideoError::open_failed(path, reason).into())
    }
}

impl Default for VideoLoader {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

fn parse_probe_output(json: &[u8]) -> std::result::Result<VideoMetadata, String> {
    let parsed: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| format!("unreadable ffprobe output: {}", e))?;

    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| "no video stream found".to_string())?;

    let width = stream.width.filter(|&w| w > 0).ok_or("missing video width")?;
    let height = stream.height.filter(|&h| h > 0).ok_or("missing video height")?;

    let fps = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .filter_map(|rate| rate.as_deref().and_then(parse_frame_rate))
        .next()
        .ok_or("missing or invalid frame rate")?;

    let duration = stream
        .duration
        .as_deref()
        .or_else(|| parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or_else(|| (duration * fps) as i64);

    Ok(VideoMetadata {
        width,
        height,
        fps,
        frame_count,
        duration,
        codec: stream.codec_name.clone().unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Parse an ffmpeg rational such as `30000/1001`
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/').unwrap_or((rate, "1"));
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// An opened, probed input video
#[derive(Debug)]
pub struct VideoSource {
    path: PathBuf,
    ffmpeg: PathBuf,
    metadata: VideoMetadata,
}

impl VideoSource {
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Start decoding from the first frame
    ///
    /// Every call starts a fresh decoder; the returned stream only moves forward.
    pub fn frames(&self) -> Result<FrameStream> {
        let mut child = Command::new(&self.ffmpeg)
            .args(decoder_args(&self.path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                VideoError::open_failed(&self.path, format!("failed to spawn {}: {}", self.ffmpeg.display(), e))
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VideoError::DecodingFailed {
                    reason: "failed to open ffmpeg output pipes".to_string(),
                }
                .into());
            }
        };

        // ffmpeg blocks once the stderr pipe is full, so it is read concurrently.
        let stderr_drain = std::thread::spawn(move || -> io::Result<Vec<u8>> {
            let mut stderr = stderr;
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        debug!("Spawned decoder for {:?}", self.path);

        Ok(FrameStream {
            width: self.metadata.width,
            height: self.metadata.height,
            frame_len: self.metadata.width as usize * self.metadata.height as usize * 3,
            child: Some(child),
            stdout: Some(stdout),
            stderr_drain: Some(stderr_drain),
            decoded: 0,
        })
    }
}

/// Arguments for decoding the first video stream of `path` to packed rgb24 on stdout
///
/// `-fps_mode` needs ffmpeg 5.1 or newer.
fn decoder_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        [
            "-map",
            "0:v:0",
            "-fps_mode",
            "passthrough",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "pipe:1",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}

/// Lazily decoded frames, in presentation order
///
/// Yields `None` once the decoder reaches the end of the input and exits cleanly.
/// A short read or a failing decoder yields a single `DecodingFailed` error. Dropping
/// the stream early stops the decoder process.
pub struct FrameStream {
    width: u32,
    height: u32,
    frame_len: usize,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<JoinHandle<io::Result<Vec<u8>>>>,
    decoded: u64,
}

impl FrameStream {
    /// Frames decoded so far
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < buf.len() {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(VideoError::DecodingFailed {
                        reason: format!("reading decoded frame failed: {}", e),
                    }
                    .into())
                }
            }
        }

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }

        if filled < buf.len() {
            self.stop();
            return Err(VideoError::DecodingFailed {
                reason: format!(
                    "truncated frame {}: got {} of {} bytes",
                    self.decoded + 1,
                    filled,
                    buf.len()
                ),
            }
            .into());
        }

        self.decoded += 1;
        Frame::from_rgb_bytes(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| {
                VideoError::DecodingFailed {
                    reason: "decoded frame does not match source dimensions".to_string(),
                }
                .into()
            })
    }

    /// Reap the decoder after end of stream and surface its failure, if any
    fn finish(&mut self) -> Result<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().map_err(|e| VideoError::DecodingFailed {
            reason: format!("failed to wait for ffmpeg: {}", e),
        })?;
        let stderr = self.join_stderr();

        if !status.success() {
            return Err(VideoError::DecodingFailed {
                reason: format!("ffmpeg exited with {}: {}", status, stderr.trim()),
            }
            .into());
        }

        info!("Decoder finished after {} frames", self.decoded);
        Ok(())
    }

    fn stop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("Decoder already exited: {}", e);
            }
            if let Err(e) = child.wait() {
                warn!("Failed to reap decoder process: {}", e);
            }
        }
        self.join_stderr();
    }

    /// Collect whatever the decoder wrote to stderr; empty once already collected
    fn join_stderr(&mut self) -> String {
        let Some(drain) = self.stderr_drain.take() else {
            return String::new();
        };
        match drain.join() {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Err(e)) => {
                warn!("Failed to read decoder stderr: {}", e);
                String::new()
            }
            Err(_) => {
                warn!("Decoder stderr reader panicked");
                String::new()
            }
        }
    }
}

impl Iterator for FrameStream {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeyerError;

    const PROBE_JSON: &str = r#"{
        "streams": [
            { "codec_type": "audio", "codec_name": "aac" },
            {
                "codec_type": "video",
                "codec_name": "h264",
                "width": 720,
                "height": 1280,
                "r_frame_rate": "30000/1001",
                "avg_frame_rate": "30000/1001",
                "nb_frames": "150",
                "duration": "5.005000"
            }
        ],
        "format": { "duration": "5.012000" }
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let metadata = parse_probe_output(PROBE_JSON.as_bytes()).unwrap();
        assert_eq!(metadata.width, 720);
        assert_eq!(metadata.height, 1280);
        assert!((metadata.fps - 29.97002997).abs() < 1e-6);
        assert_eq!(metadata.frame_count, 150);
        assert_eq!(metadata.codec, "h264");
        assert!((metadata.duration - 5.005).abs() < 1e-9);
    }

    #[test]
    fn test_frame_count_is_estimated_without_nb_frames() {
        let json = r#"{
            "streams": [
                { "codec_type": "video", "width": 64, "height": 64, "r_frame_rate": "0/0", "avg_frame_rate": "25/1" }
            ],
            "format": { "duration": "2.0" }
        }"#;
        let metadata = parse_probe_output(json.as_bytes()).unwrap();
        assert_eq!(metadata.fps, 25.0);
        assert_eq!(metadata.frame_count, 50);
        assert_eq!(metadata.codec, "unknown");
    }

    #[test]
    fn test_probe_without_video_stream() {
        let json = r#"{ "streams": [ { "codec_type": "audio" } ] }"#;
        assert!(parse_probe_output(json.as_bytes()).is_err());
        assert!(parse_probe_output(b"not json").is_err());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_decoder_args_keep_every_frame() {
        let args: Vec<String> = decoder_args(Path::new("clips/in.mp4"))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-i") + 1], "clips/in.mp4");
        assert_eq!(args[pos("-fps_mode") + 1], "passthrough");
        assert_eq!(args[pos("-pix_fmt") + 1], "rgb24");
        assert!(!args.iter().any(|a| a == "-vsync"));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[test]
    fn test_open_missing_file() {
        let err = VideoLoader::default().open("/no/such/clip.mp4").unwrap_err();
        match err {
            KeyerError::Video(VideoError::OpenFailed { path, .. }) => {
                assert_eq!(path, "/no/such/clip.mp4");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    fn fake_decoder(dir: &Path, body: &str) -> VideoSource {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        VideoSource {
            path: dir.join("clip.mp4"),
            ffmpeg: script,
            metadata: VideoMetadata {
                width: 2,
                height: 2,
                fps: 30.0,
                frame_count: 1,
                duration: 1.0 / 30.0,
                codec: "rawvideo".to_string(),
            },
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_noisy_decoder_does_not_stall() {
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        // Far more warnings than a pipe buffer holds, then one 2x2 frame.
        let source = fake_decoder(
            dir.path(),
            "head -c 300000 /dev/zero | tr '\\0' x >&2\nprintf 'AAAAAAAAAAAA'\n",
        );

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let frames: Vec<Frame> = source.frames().unwrap().collect::<Result<_>>().unwrap();
            tx.send(frames).unwrap();
        });

        let frames = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("decoder stalled on a full stderr pipe");
        assert_eq!(frames.len(), 1);
        assert_eq!((frames[0].width(), frames[0].height()), (2, 2));
        assert_eq!(frames[0].get_pixel(1, 1), [b'A', b'A', b'A']);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_decoder_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let source = fake_decoder(
            dir.path(),
            "printf 'AAAAAAAAAAAA'\necho 'Invalid data found when processing input' >&2\nexit 1\n",
        );

        let mut frames = source.frames().unwrap();
        assert!(frames.next().unwrap().is_ok());
        match frames.next() {
            Some(Err(KeyerError::Video(VideoError::DecodingFailed { reason }))) => {
                assert!(reason.contains("Invalid data found"), "{reason}");
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.map(|_| ()))),
        }
        assert!(frames.next().is_none());
        assert_eq!(frames.decoded(), 1);
    }

    #[test]
    fn test_open_with_missing_ffprobe() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"not really a video").unwrap();

        let loader = VideoLoader::new("ffmpeg", dir.path().join("no-ffprobe-here"));
        let err = loader.open(&input).unwrap_err();
        assert!(matches!(err, KeyerError::Video(VideoError::OpenFailed { .. })));
    }
}
