//! Webcam object detection overlay

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use argus::app::App;
use argus::config::ArgusConfig;

#[derive(Parser)]
#[command(
    name = "argus",
    about = "Real-time object detection overlay for webcam streams",
    version
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera device ID
    #[arg(long)]
    camera: Option<u32>,

    /// Detection score threshold (0.0 to 1.0)
    #[arg(long)]
    threshold: Option<f32>,

    /// Use this ONNX model file instead of the managed one
    #[arg(long)]
    model: Option<PathBuf>,

    /// Run without a preview window
    #[arg(long)]
    headless: bool,

    /// Save snapshots to this directory when 's' is pressed
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Log level filter
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => ArgusConfig::load(path)?,
        None => ArgusConfig::default(),
    };
    if let Some(camera) = cli.camera {
        config.camera_id = camera;
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    if cli.model.is_some() {
        config.model_file = cli.model;
    }
    if cli.headless {
        config.headless = true;
    }
    if cli.snapshot_dir.is_some() {
        config.snapshot_dir = cli.snapshot_dir;
    }

    info!("🚀 Starting argus...");
    App::new(config)?.run().await?;
    Ok(())
}
