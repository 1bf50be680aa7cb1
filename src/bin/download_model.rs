//! Standalone model downloader
//!
//! Fetches the detection model into the configured model directory so
//! the first run of argus does not need network access.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use argus::config::ArgusConfig;
use argus::models::ModelManager;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let config = Arc::new(ArgusConfig::default());
    info!("Model directory: {:?}", config.model_path);

    let manager = ModelManager::new(config);
    let path = manager.get_ssd_model().await?;
    info!("Model ready at {:?}", path);
    Ok(())
}
