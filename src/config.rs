//! Configuration for camera capture, detection and overlay rendering

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::VisionError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgusConfig {
    /// Camera device ID (usually 0 for the default webcam)
    pub camera_id: u32,
    /// Target frame rate for capture
    pub frame_rate: u32,
    /// Requested capture resolution (width, height)
    pub resolution: (u32, u32),
    /// Minimum score a detection must exceed to be rendered
    pub threshold: f32,
    /// Upper bound on detections kept per frame
    pub max_detections: usize,
    /// Directory where detection models are stored
    pub model_path: PathBuf,
    /// Explicit model file, bypassing the managed model directory
    pub model_file: Option<PathBuf>,
    /// Title of the preview window
    pub window_name: String,
    /// Run without any preview window
    pub headless: bool,
    /// Directory for frame snapshots, disabled when unset
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for ArgusConfig {
    fn default() -> Self {
        Self {
            camera_id: 0,
            frame_rate: 30,
            resolution: (640, 480),
            threshold: 0.6,
            max_detections: 20,
            model_path: dirs::home_dir()
                .map(|h| h.join(".argus").join("models"))
                .unwrap_or_else(|| PathBuf::from("./models")),
            model_file: None,
            window_name: "argus".to_string(),
            headless: false,
            snapshot_dir: None,
        }
    }
}

impl ArgusConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| VisionError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(format!(
                "Invalid frame rate: {}. Must be between 1 and 120",
                self.frame_rate
            ));
        }

        let (width, height) = self.resolution;
        if width == 0 || height == 0 {
            return Err("Resolution dimensions must be greater than 0".to_string());
        }
        if width > 7680 || height > 4320 {
            return Err(format!(
                "Resolution {}x{} exceeds maximum supported resolution (7680x4320)",
                width, height
            ));
        }

        if self.camera_id > 100 {
            return Err(format!(
                "Invalid camera ID: {}. Must be between 0 and 100",
                self.camera_id
            ));
        }

        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "Invalid score threshold: {}. Must be between 0.0 and 1.0",
                self.threshold
            ));
        }

        if self.max_detections == 0 || self.max_detections > 100 {
            return Err(format!(
                "Invalid max detections: {}. Must be between 1 and 100",
                self.max_detections
            ));
        }

        if self.window_name.is_empty() {
            return Err("Window name must not be empty".to_string());
        }

        Ok(())
    }
}
