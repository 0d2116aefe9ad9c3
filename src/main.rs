use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};

use alpha_keyer::{config::Config, conversion::ConversionEngine};

#[derive(Parser)]
#[command(
    name = "alpha-keyer",
    version,
    about = "Remove the black background from a video clip",
    long_about = "Alpha-Keyer turns a clip shot against black into a WebM with an alpha channel: dark pixels become transparent, edges are feathered, and the clip is trimmed to a time window."
)]
struct Cli {
    /// Input video file
    #[arg(short, long)]
    input: PathBuf,

    /// Output WebM file
    #[arg(short, long)]
    output: PathBuf,

    /// Brightness cutoff (0-255); darker pixels become transparent
    #[arg(short, long)]
    threshold: Option<u8>,

    /// Feather blur radius in pixels (0 disables feathering)
    #[arg(short, long)]
    feather: Option<u32>,

    /// Gaussian sigma for feathering (derived from the radius when omitted)
    #[arg(long)]
    feather_sigma: Option<f64>,

    /// Trim start, in seconds
    #[arg(long)]
    trim_start: Option<f64>,

    /// Trim end, in seconds
    #[arg(long)]
    trim_end: Option<f64>,

    /// Directory to create the scratch frame directory in
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// ffprobe executable
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags take precedence over the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(threshold) = self.threshold {
            config.matte.threshold = threshold;
        }
        if let Some(radius) = self.feather {
            config.matte.feather_radius = radius;
        }
        if self.feather_sigma.is_some() {
            config.matte.feather_sigma = self.feather_sigma;
        }
        if let Some(start) = self.trim_start {
            config.trim.start_sec = start;
        }
        if let Some(end) = self.trim_end {
            config.trim.end_sec = end;
        }
        if self.scratch_dir.is_some() {
            config.tools.scratch_root = self.scratch_dir.clone();
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            config.tools.ffmpeg = ffmpeg.clone();
        }
        if let Some(ffprobe) = &self.ffprobe {
            config.tools.ffprobe = ffprobe.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting Alpha-Keyer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);

    let engine = ConversionEngine::new(config);
    let report = match engine.convert(&cli.input, &cli.output) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    info!(
        "Done! → {} ({:.0} KB)",
        report.output.display(),
        report.file_size as f64 / 1024.0
    );
    info!(
        "Update the app that plays this clip: point its video src at {}",
        report.output.display()
    );
    info!("And remove its mixBlendMode: screen workaround");
    Ok(())
}
