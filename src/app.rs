//! Application startup and shutdown orchestration

use std::sync::Arc;

use tokio::signal;
use tracing::info;

use crate::camera::CameraManager;
use crate::config::ArgusConfig;
use crate::display::{DisplaySurface, NullDisplay, WindowDisplay};
use crate::error::VisionError;
use crate::models::{Detector, ModelManager, SsdModel};
use crate::predict::PredictionLoop;

/// Wires the model, camera and prediction loop together and runs them
/// until something asks for shutdown.
pub struct App {
    config: Arc<ArgusConfig>,
}

impl App {
    pub fn new(config: ArgusConfig) -> Result<Self, VisionError> {
        config.validate().map_err(VisionError::Config)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Bring everything up in order, then run until the loop ends or a
    /// shutdown signal arrives. Startup failures abort the whole run.
    pub async fn run(&self) -> Result<(), VisionError> {
        let mut display: Box<dyn DisplaySurface> = if self.config.headless {
            Box::new(NullDisplay)
        } else {
            Box::new(WindowDisplay::new(&self.config.window_name))
        };
        display.show_loading("Loading detection model...")?;

        info!("📦 Preparing detection model...");
        let manager = ModelManager::new(Arc::clone(&self.config));
        let model_path = manager.get_ssd_model().await?;
        let detector: Arc<dyn Detector> =
            Arc::new(SsdModel::new(&model_path, self.config.max_detections)?);
        info!("✅ Detection model ready");

        info!("🎥 Initializing camera {}...", self.config.camera_id);
        let camera = CameraManager::new(Arc::clone(&self.config));
        camera.initialize()?;
        let frames = camera.start_stream()?;
        info!("✅ Camera stream ready");

        let prediction_loop = PredictionLoop::new(Arc::clone(&self.config));
        prediction_loop.start(Some(frames), Some(detector), display)?;
        info!("🔍 Prediction loop running, press 'q' in the window or Ctrl+C to stop");

        tokio::select! {
            _ = wait_for_shutdown() => info!("🛑 Shutdown signal received"),
            _ = prediction_loop.wait_until_stopped() => {}
        }

        let outcome = prediction_loop.stop().await;
        camera.stop();
        outcome?;

        info!("👋 Argus stopped");
        Ok(())
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
