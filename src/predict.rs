//! Per-frame prediction loop driving the overlay
//!
//! One background task pulls frames off the camera channel, runs the
//! detector, reconciles the overlay and pushes the result to a display
//! surface. The loop ends when the stream closes, the display asks to
//! close, [`PredictionLoop::stop`] is called, or detection fails.

use std::sync::Arc;
use std::time::Duration;

use opencv::core::Mat;
use opencv::prelude::*;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ArgusConfig;
use crate::display::{render_annotations, DisplayEvent, DisplaySurface};
use crate::error::VisionError;
use crate::models::Detector;
use crate::overlay::Overlay;
use crate::snapshot::SnapshotWriter;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

pub struct PredictionLoop {
    config: Arc<ArgusConfig>,
    overlay: Arc<RwLock<Overlay>>,
    is_running: Arc<RwLock<bool>>,
    handle: RwLock<Option<JoinHandle<Result<(), VisionError>>>>,
}

impl PredictionLoop {
    pub fn new(config: Arc<ArgusConfig>) -> Self {
        Self {
            config,
            overlay: Arc::new(RwLock::new(Overlay::new())),
            is_running: Arc::new(RwLock::new(false)),
            handle: RwLock::new(None),
        }
    }

    /// Shared handle to the overlay this loop maintains.
    pub fn overlay(&self) -> Arc<RwLock<Overlay>> {
        Arc::clone(&self.overlay)
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }

    /// Start predicting over `frames`, updating the overlay and pushing
    /// every processed frame to `display`.
    ///
    /// Both collaborators are required up front: without a frame stream
    /// this fails with [`VisionError::MissingWebcam`], without a
    /// detector with [`VisionError::MissingModel`], and in either case
    /// no detection is attempted.
    pub fn start(
        &self,
        frames: Option<mpsc::Receiver<Mat>>,
        detector: Option<Arc<dyn Detector>>,
        display: Box<dyn DisplaySurface>,
    ) -> Result<(), VisionError> {
        let frames = frames.ok_or(VisionError::MissingWebcam)?;
        let detector = detector.ok_or(VisionError::MissingModel)?;

        {
            let mut is_running = self.is_running.write();
            if *is_running {
                return Err(VisionError::Processing(
                    "Prediction loop already running".to_string(),
                ));
            }
            *is_running = true;
        }

        let snapshots = match self.config.snapshot_dir.as_deref().map(SnapshotWriter::new) {
            Some(Ok(writer)) => Some(writer),
            Some(Err(e)) => {
                *self.is_running.write() = false;
                return Err(e);
            }
            None => None,
        };

        let handle = tokio::spawn(run_loop(
            frames,
            detector,
            display,
            Arc::clone(&self.overlay),
            Arc::clone(&self.is_running),
            Arc::clone(&self.config),
            snapshots,
        ));
        *self.handle.write() = Some(handle);
        Ok(())
    }

    /// Ask the loop to stop and wait for it to wind down.
    pub async fn stop(&self) -> Result<(), VisionError> {
        *self.is_running.write() = false;

        let handle = self.handle.write().take();
        if let Some(handle) = handle {
            info!("Stopping prediction loop");
            let abort = handle.abort_handle();
            match timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(VisionError::Processing(format!(
                    "Prediction loop task failed: {}",
                    e
                ))),
                Err(_) => {
                    abort.abort();
                    Err(VisionError::Processing(
                        "Prediction loop did not stop in time".to_string(),
                    ))
                }
            }
        } else {
            Ok(())
        }
    }

    /// Wait until the loop is no longer running, without reaping it.
    ///
    /// Useful for watching a loop that may end on its own; call
    /// [`stop`](Self::stop) or [`join`](Self::join) afterwards to
    /// collect its outcome.
    pub async fn wait_until_stopped(&self) {
        while self.is_running() {
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }

    /// Wait for the loop to finish on its own, surfacing its outcome.
    pub async fn join(&self) -> Result<(), VisionError> {
        let handle = self.handle.write().take();
        if let Some(handle) = handle {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(VisionError::Processing(format!(
                    "Prediction loop task failed: {}",
                    e
                ))),
            }
        } else {
            Ok(())
        }
    }
}

async fn run_loop(
    mut frames: mpsc::Receiver<Mat>,
    detector: Arc<dyn Detector>,
    mut display: Box<dyn DisplaySurface>,
    overlay: Arc<RwLock<Overlay>>,
    is_running: Arc<RwLock<bool>>,
    config: Arc<ArgusConfig>,
    snapshots: Option<SnapshotWriter>,
) -> Result<(), VisionError> {
    info!("Prediction loop started");

    let result = loop {
        if !*is_running.read() {
            break Ok(());
        }

        // Bounded wait so a stop request is noticed even on a silent
        // camera.
        let frame = match timeout(STOP_POLL_INTERVAL, frames.recv()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Frame stream closed");
                break Ok(());
            }
            Err(_) => continue,
        };

        if frame.empty().unwrap_or(true) {
            debug!("Skipping empty frame");
            continue;
        }

        let predictions = match detector.detect(&frame).await {
            Ok(predictions) => predictions,
            Err(e) => break Err(e),
        };

        let stats = overlay.write().sync(&predictions, config.threshold);
        debug!(
            "Overlay synced: {} admitted, {} created, {} updated, {} removed",
            stats.admitted, stats.created, stats.updated, stats.removed
        );

        let event = {
            let overlay = overlay.read();
            match display.present(&frame, &overlay) {
                Ok(event) => event,
                Err(e) => break Err(e),
            }
        };
        match event {
            DisplayEvent::CloseRequested => {
                info!("Close requested from display");
                break Ok(());
            }
            DisplayEvent::SnapshotRequested => {
                if let Some(writer) = &snapshots {
                    let annotated = {
                        let overlay = overlay.read();
                        render_annotations(&frame, &overlay)
                    };
                    match annotated.and_then(|mat| writer.save(&mat, &predictions)) {
                        Ok(path) => info!("Snapshot saved to {:?}", path),
                        Err(e) => warn!("Snapshot failed: {}", e),
                    }
                } else {
                    warn!("Snapshot requested but no snapshot directory is configured");
                }
            }
            DisplayEvent::None => {}
        }
    };

    *is_running.write() = false;
    match &result {
        Ok(()) => info!("Prediction loop stopped"),
        Err(e) => error!("Prediction loop terminated: {}", e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_loop_is_idle() {
        let looper = PredictionLoop::new(Arc::new(ArgusConfig::default()));
        assert!(!looper.is_running());
        assert!(looper.overlay().read().is_empty());
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let looper = PredictionLoop::new(Arc::new(ArgusConfig::default()));
        assert!(looper.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_join_before_start() {
        let looper = PredictionLoop::new(Arc::new(ArgusConfig::default()));
        assert!(looper.join().await.is_ok());
    }
}
