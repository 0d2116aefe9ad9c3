use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for a conversion run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Alpha mask settings
    pub matte: MatteConfig,

    /// Time window of the source to keep
    pub trim: TrimConfig,

    /// External programs and scratch location
    pub tools: ToolConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.matte.validate()?;
        self.trim.validate()?;
        self.tools.validate()?;
        Ok(())
    }
}

/// Alpha mask configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatteConfig {
    /// Brightness cutoff on the 0-255 scale; pixels whose brightest channel is
    /// below it become transparent
    pub threshold: u8,

    /// Feather blur radius in pixels (0 = hard edges)
    pub feather_radius: u32,

    /// Gaussian sigma for the feather blur. `None` derives it from the kernel size.
    pub feather_sigma: Option<f64>,
}

impl Default for MatteConfig {
    fn default() -> Self {
        Self {
            threshold: 35,
            feather_radius: 3,
            feather_sigma: None,
        }
    }
}

impl MatteConfig {
    fn validate(&self) -> Result<()> {
        if let Some(sigma) = self.feather_sigma {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: "matte.feather_sigma".to_string(),
                    value: sigma.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Trim window, in seconds from the start of the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Frames at or before this time are dropped (seconds)
    pub start_sec: f64,

    /// Decoding stops after this time (seconds)
    pub end_sec: f64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            start_sec: 1.0,
            end_sec: 3.056,
        }
    }
}

impl TrimConfig {
    fn validate(&self) -> Result<()> {
        for (key, value) in [("trim.start_sec", self.start_sec), ("trim.end_sec", self.end_sec)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// External tool locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// ffmpeg executable, used for decoding and encoding
    pub ffmpeg: PathBuf,

    /// ffprobe executable, used to read source metadata
    pub ffprobe: PathBuf,

    /// Parent directory for the scratch frame directory (system temp dir if unset)
    pub scratch_root: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            scratch_root: None,
        }
    }
}

impl ToolConfig {
    fn validate(&self) -> Result<()> {
        for (key, value) in [("tools.ffmpeg", &self.ffmpeg), ("tools.ffprobe", &self.ffprobe)] {
            if value.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: String::new(),
                }
                .into());
            }
        }

        Ok(())
    }
}
