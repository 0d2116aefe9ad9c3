use std::path::Path;

use thiserror::Error;

/// Main error type for the alpha-keyer library
#[derive(Error, Debug)]
pub enum KeyerError {
    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video-specific errors, one variant per pipeline stage that can fail
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Cannot open {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Failed to write frame {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("ffmpeg exited with {status}:\n{stderr_tail}")]
    EncodingFailed { status: String, stderr_tail: String },

    #[error("Encoder '{program}' could not be started: {reason}")]
    EncoderUnavailable { program: String, reason: String },

    #[error("Invalid video parameters: {details}")]
    InvalidParameters { details: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using KeyerError
pub type Result<T> = std::result::Result<T, KeyerError>;

impl KeyerError {
    /// Get a user-friendly error message naming the stage that failed
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::OpenFailed { path, reason }) => {
                format!("ERROR: Cannot open {} ({})", path, reason)
            }
            Self::Video(VideoError::DecodingFailed { reason }) => {
                format!("Decoding failed: {}", reason)
            }
            Self::Video(VideoError::WriteFailed { path, reason }) => {
                format!("Could not write frame '{}': {}", path, reason)
            }
            Self::Video(VideoError::EncodingFailed { stderr_tail, .. }) => {
                format!("ffmpeg error:\n{}", stderr_tail)
            }
            Self::Video(VideoError::EncoderUnavailable { program, .. }) => {
                format!("Could not run '{}'. Please check ffmpeg is installed and on PATH.", program)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

impl VideoError {
    pub(crate) fn open_failed<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::OpenFailed {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn write_failed<P: AsRef<Path>, S: ToString>(path: P, reason: S) -> Self {
        Self::WriteFailed {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}
