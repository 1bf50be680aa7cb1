//! Camera device management and frame streaming

use std::sync::Arc;
use std::time::{Duration, Instant};

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ArgusConfig;
use crate::error::VisionError;

const FRAME_BUFFER_SIZE: usize = 30;
const WARMUP_ATTEMPTS: usize = 30;
const WARMUP_DELAY: Duration = Duration::from_millis(100);
const MAX_CONSECUTIVE_FAILURES: u32 = 10;
const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(100);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Owns the capture device and pumps frames into a bounded channel.
pub struct CameraManager {
    config: Arc<ArgusConfig>,
    capture: Arc<RwLock<Option<videoio::VideoCapture>>>,
    is_running: Arc<RwLock<bool>>,
}

impl CameraManager {
    pub fn new(config: Arc<ArgusConfig>) -> Self {
        Self {
            config,
            capture: Arc::new(RwLock::new(None)),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Open the configured camera and wait for it to deliver a playable
    /// frame.
    ///
    /// A missing capture backend maps to
    /// [`VisionError::UnsupportedPlatform`]; a device that refuses to
    /// open or never yields a frame maps to
    /// [`VisionError::AccessDenied`] carrying the platform error.
    pub fn initialize(&self) -> Result<(), VisionError> {
        info!("Initializing camera {}", self.config.camera_id);

        let mut capture = videoio::VideoCapture::new(self.config.camera_id as i32, videoio::CAP_ANY)
            .map_err(|e| {
                VisionError::UnsupportedPlatform(format!(
                    "No video capture backend available: {}",
                    e.message
                ))
            })?;

        let opened = capture.is_opened().map_err(VisionError::AccessDenied)?;
        if !opened {
            return Err(VisionError::AccessDenied(opencv::Error::new(
                opencv::core::StsError,
                format!("Camera {} failed to open", self.config.camera_id),
            )));
        }

        let (width, height) = self.config.resolution;
        if !capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)? {
            warn!("Camera {} rejected frame width {}", self.config.camera_id, width);
        }
        if !capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)? {
            warn!("Camera {} rejected frame height {}", self.config.camera_id, height);
        }
        if !capture.set(videoio::CAP_PROP_FPS, self.config.frame_rate as f64)? {
            warn!("Camera {} rejected frame rate {}", self.config.camera_id, self.config.frame_rate);
        }

        // Some devices open fine but deliver nothing until the sensor
        // settles. Treat a device that never produces a frame the same
        // as one we could not open.
        let mut warmed = false;
        for _ in 0..WARMUP_ATTEMPTS {
            let mut frame = Mat::default();
            let grabbed = capture.read(&mut frame).map_err(VisionError::AccessDenied)?;
            if grabbed && !frame.empty()? {
                warmed = true;
                break;
            }
            std::thread::sleep(WARMUP_DELAY);
        }
        if !warmed {
            return Err(VisionError::AccessDenied(opencv::Error::new(
                opencv::core::StsError,
                format!("Camera {} produced no playable frame", self.config.camera_id),
            )));
        }

        *self.capture.write() = Some(capture);
        info!("Camera {} initialized successfully", self.config.camera_id);
        Ok(())
    }

    /// Start pumping frames into a bounded channel and hand back the
    /// receiving end.
    ///
    /// The pump paces itself to the configured frame rate and stops when
    /// the receiver is dropped, [`stop`](Self::stop) is called, or the
    /// device fails repeatedly.
    pub fn start_stream(&self) -> Result<mpsc::Receiver<Mat>, VisionError> {
        {
            let mut is_running = self.is_running.write();
            if *is_running {
                return Err(VisionError::Camera("Camera stream already running".to_string()));
            }
            *is_running = true;
        }
        if self.capture.read().is_none() {
            *self.is_running.write() = false;
            return Err(VisionError::Camera("Camera not initialized".to_string()));
        }

        let (tx, rx) = mpsc::channel(FRAME_BUFFER_SIZE);
        let capture = Arc::clone(&self.capture);
        let is_running = Arc::clone(&self.is_running);
        let frame_interval = Duration::from_millis(1000 / self.config.frame_rate.max(1) as u64);
        let camera_id = self.config.camera_id;

        tokio::spawn(async move {
            info!("Camera {} stream started", camera_id);
            let mut consecutive_failures: u32 = 0;

            loop {
                if !*is_running.read() {
                    break;
                }
                let started = Instant::now();

                // Keep the lock only for the read itself; the guard must
                // be gone before the first await point.
                let grabbed = {
                    let mut guard = capture.write();
                    match guard.as_mut() {
                        Some(cap) => {
                            let mut frame = Mat::default();
                            cap.read(&mut frame).and_then(|ok| {
                                if ok {
                                    Ok(frame)
                                } else {
                                    Err(opencv::Error::new(
                                        opencv::core::StsError,
                                        "Camera read returned no frame".to_string(),
                                    ))
                                }
                            })
                        }
                        None => break,
                    }
                };

                match grabbed {
                    Ok(frame) if !frame.empty().unwrap_or(true) => {
                        consecutive_failures = 0;
                        if tx.send(frame).await.is_err() {
                            debug!("Frame receiver dropped, stopping camera stream");
                            break;
                        }
                    }
                    Ok(_) => {
                        debug!("Camera {} returned an empty frame", camera_id);
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(
                            "Camera {} read failed ({}/{}): {}",
                            camera_id, consecutive_failures, MAX_CONSECUTIVE_FAILURES, e
                        );
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            error!(
                                "Camera {} failed {} times in a row, stopping stream",
                                camera_id, MAX_CONSECUTIVE_FAILURES
                            );
                            break;
                        }
                        let backoff =
                            RETRY_BACKOFF_BASE * 2u32.saturating_pow(consecutive_failures.min(5));
                        tokio::time::sleep(backoff.min(MAX_RETRY_BACKOFF)).await;
                        continue;
                    }
                }

                let elapsed = started.elapsed();
                if elapsed < frame_interval {
                    tokio::time::sleep(frame_interval - elapsed).await;
                }
            }

            *is_running.write() = false;
            info!("Camera {} stream stopped", camera_id);
        });

        Ok(rx)
    }

    /// Grab a single frame outside the streaming loop.
    pub fn capture_frame(&self) -> Result<Mat, VisionError> {
        let mut guard = self.capture.write();
        let capture = guard
            .as_mut()
            .ok_or_else(|| VisionError::Camera("Camera not initialized".to_string()))?;

        let mut frame = Mat::default();
        let grabbed = capture
            .read(&mut frame)
            .map_err(|e| VisionError::Camera(format!("Failed to read frame: {}", e)))?;
        if !grabbed || frame.empty()? {
            return Err(VisionError::Camera("Camera returned an empty frame".to_string()));
        }
        Ok(frame)
    }

    /// Stop the stream and release the device.
    pub fn stop(&self) {
        let was_running = {
            let mut is_running = self.is_running.write();
            let was = *is_running;
            *is_running = false;
            was
        };
        if was_running {
            info!("Stopping camera {} stream", self.config.camera_id);
        }
        *self.capture.write() = None;
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CameraManager {
        CameraManager::new(Arc::new(ArgusConfig::default()))
    }

    #[test]
    fn test_new_manager_is_idle() {
        let camera = manager();
        assert!(!camera.is_running());
    }

    #[test]
    fn test_capture_frame_before_initialize() {
        let camera = manager();
        let result = camera.capture_frame();
        assert!(matches!(result, Err(VisionError::Camera(_))));
    }

    #[tokio::test]
    async fn test_start_stream_before_initialize() {
        let camera = manager();
        let result = camera.start_stream();
        assert!(matches!(result, Err(VisionError::Camera(_))));
        assert!(!camera.is_running());
    }

    #[test]
    fn test_stop_without_start_is_harmless() {
        let camera = manager();
        camera.stop();
        camera.stop();
        assert!(!camera.is_running());
    }
}
