//! Model file management: download, cache and verify detection models

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::ArgusConfig;
use crate::error::VisionError;

const SSD_MOBILENET_FILE: &str = "ssd_mobilenet_v1_10.onnx";
const SSD_MOBILENET_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/object_detection_segmentation/ssd-mobilenetv1/model/ssd_mobilenet_v1_10.onnx";
/// SHA-256 of the pinned model release. Empty disables verification.
const SSD_MOBILENET_CHECKSUM: &str = "";

const MAX_MODEL_SIZE: u64 = 2 * 1024 * 1024 * 1024;
const MIN_MODEL_SIZE: u64 = 1024;
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

/// Downloads models into the configured model directory and hands out
/// paths to verified files.
pub struct ModelManager {
    config: Arc<ArgusConfig>,
}

impl ModelManager {
    pub fn new(config: Arc<ArgusConfig>) -> Self {
        Self { config }
    }

    /// Resolve the SSD-MobileNet model file, downloading it if needed.
    ///
    /// An explicit `model_file` in the configuration bypasses the managed
    /// model directory entirely.
    pub async fn get_ssd_model(&self) -> Result<PathBuf, VisionError> {
        if let Some(file) = &self.config.model_file {
            if file.exists() {
                debug!("Using model file override: {:?}", file);
                return Ok(file.clone());
            }
            return Err(VisionError::Model(format!(
                "Model file not found: {}",
                file.display()
            )));
        }
        self.ensure_model(SSD_MOBILENET_FILE, SSD_MOBILENET_URL, SSD_MOBILENET_CHECKSUM)
            .await
    }

    /// Create the model directory if it does not exist yet.
    pub fn ensure_model_dir(&self) -> Result<PathBuf, VisionError> {
        let model_path = &self.config.model_path;
        if !model_path.exists() {
            std::fs::create_dir_all(model_path)?;
            info!("Created model directory: {:?}", model_path);
        }
        Ok(model_path.clone())
    }

    /// Make sure `model_name` exists in the model directory, downloading
    /// from `url` when missing or failing checksum verification.
    pub async fn ensure_model(
        &self,
        model_name: &str,
        url: &str,
        expected_checksum: &str,
    ) -> Result<PathBuf, VisionError> {
        Self::validate_model_name(model_name)?;
        Self::validate_url(url)?;
        self.ensure_model_dir()?;

        let model_path = self.config.model_path.join(model_name);
        if model_path.exists() {
            if !expected_checksum.is_empty()
                && !Self::verify_checksum(&model_path, expected_checksum)?
            {
                warn!("Checksum mismatch for cached model {}, re-downloading", model_name);
                std::fs::remove_file(&model_path)?;
            } else {
                debug!("Model {} already present", model_name);
                return Ok(model_path);
            }
        }

        info!("Downloading model {} from {}", model_name, url);
        self.download(url, &model_path).await?;

        if !expected_checksum.is_empty() && !Self::verify_checksum(&model_path, expected_checksum)? {
            std::fs::remove_file(&model_path)?;
            return Err(VisionError::Model(format!(
                "Checksum verification failed for {}",
                model_name
            )));
        }

        info!("Model {} ready at {:?}", model_name, model_path);
        Ok(model_path)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), VisionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(VisionError::Model(format!(
                "Download failed with HTTP status {}",
                response.status()
            )));
        }
        if let Some(length) = response.content_length() {
            if length > MAX_MODEL_SIZE {
                return Err(VisionError::Model(format!(
                    "Model size {} bytes exceeds the {} byte limit",
                    length, MAX_MODEL_SIZE
                )));
            }
        }

        let bytes = response.bytes().await?;
        if (bytes.len() as u64) < MIN_MODEL_SIZE {
            return Err(VisionError::Model(format!(
                "Downloaded model is only {} bytes, expected at least {}",
                bytes.len(),
                MIN_MODEL_SIZE
            )));
        }
        if bytes.len() as u64 > MAX_MODEL_SIZE {
            return Err(VisionError::Model(format!(
                "Downloaded model is {} bytes, over the {} byte limit",
                bytes.len(),
                MAX_MODEL_SIZE
            )));
        }

        Self::persist_download(&bytes, dest)
    }

    /// Write bytes under a temporary name first so a failed download
    /// never leaves a truncated model behind.
    fn persist_download(bytes: &[u8], dest: &Path) -> Result<(), VisionError> {
        let tmp_path = dest.with_extension("download");
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, dest).map_err(|e| {
            // Clean up the temp file on rename failure
            let _ = std::fs::remove_file(&tmp_path);
            VisionError::Io(e)
        })
    }

    fn verify_checksum(path: &Path, expected: &str) -> Result<bool, VisionError> {
        let bytes = std::fs::read(path)?;
        let digest = Sha256::digest(&bytes);
        Ok(hex::encode(digest).eq_ignore_ascii_case(expected))
    }

    fn validate_model_name(name: &str) -> Result<(), VisionError> {
        if name.is_empty() {
            return Err(VisionError::Model("Model name must not be empty".to_string()));
        }
        if name.len() > 255 {
            return Err(VisionError::Model(format!(
                "Model name too long: {} characters",
                name.len()
            )));
        }
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(VisionError::Model(format!(
                "Model name must not contain path separators: {}",
                name
            )));
        }
        Ok(())
    }

    fn validate_url(url: &str) -> Result<(), VisionError> {
        if !url.starts_with("https://") {
            return Err(VisionError::Model(format!("Model URL must use https: {}", url)));
        }
        Ok(())
    }
}
