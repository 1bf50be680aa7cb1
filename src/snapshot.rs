//! Frame snapshots with prediction sidecars

use std::path::{Path, PathBuf};

use chrono::Utc;
use opencv::core::Mat;
use serde_json::json;
use tracing::info;

use crate::error::VisionError;
use crate::models::Prediction;
use crate::utils;

/// Writes annotated frames and the predictions behind them to disk.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: &Path) -> Result<Self, VisionError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Write the annotated frame as a PNG plus a JSON sidecar holding
    /// the predictions it was rendered from. Returns the image path.
    pub fn save(&self, annotated: &Mat, predictions: &[Prediction]) -> Result<PathBuf, VisionError> {
        let captured_at = Utc::now();
        let stem = format!("frame_{}", captured_at.format("%Y%m%d_%H%M%S_%3f"));
        let image_path = self.dir.join(format!("{}.png", stem));
        let sidecar_path = self.dir.join(format!("{}.json", stem));

        let image = utils::mat_to_rgb_image(annotated)?;
        image.save(&image_path)?;

        let sidecar = json!({
            "captured_at": captured_at.to_rfc3339(),
            "predictions": predictions,
        });
        let body = serde_json::to_vec_pretty(&sidecar).map_err(|e| {
            VisionError::Processing(format!("Failed to encode snapshot sidecar: {}", e))
        })?;
        std::fs::write(&sidecar_path, body)?;

        info!("Saved snapshot to {:?}", image_path);
        Ok(image_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};
    use tempfile::TempDir;

    fn frame() -> Mat {
        Mat::new_rows_cols_with_default(8, 8, CV_8UC3, Scalar::all(90.0)).expect("mat")
    }

    #[test]
    fn test_new_creates_missing_directories() {
        let dir = TempDir::new().expect("temp dir");
        let nested = dir.path().join("a").join("b");
        let _writer = SnapshotWriter::new(&nested).expect("writer");
        assert!(nested.is_dir());
    }

    #[test]
    fn test_save_writes_image_and_sidecar() {
        let dir = TempDir::new().expect("temp dir");
        let writer = SnapshotWriter::new(dir.path()).expect("writer");
        let predictions = vec![Prediction {
            class: "dog".to_string(),
            class_id: 18,
            score: 0.5,
            bbox: [1.0, 2.0, 3.0, 4.0],
        }];

        let image_path = writer.save(&frame(), &predictions).expect("save");
        assert!(image_path.exists());
        assert_eq!(image_path.extension().and_then(|e| e.to_str()), Some("png"));

        let sidecar_path = image_path.with_extension("json");
        assert!(sidecar_path.exists());
        let raw = std::fs::read_to_string(&sidecar_path).expect("read sidecar");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("parse sidecar");
        assert!(value["captured_at"].is_string());
        assert_eq!(value["predictions"][0]["class"], "dog");
        assert_eq!(value["predictions"][0]["score"], 0.5);
    }
}
