//! Detection models and model file management

pub mod manager;
pub mod ssd;

pub use manager::ModelManager;
pub use ssd::{coco_label, SsdModel};

use async_trait::async_trait;
use opencv::core::Mat;
use serde::{Deserialize, Serialize};

use crate::error::VisionError;

/// One detected object reported by a model.
///
/// `bbox` is `[x, y, width, height]` in pixels of the source frame, with
/// the origin at the top-left corner. `score` is reported exactly as the
/// model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    pub class_id: u32,
    pub score: f32,
    pub bbox: [f32; 4],
}

/// A model that can locate objects in a frame.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &Mat) -> Result<Vec<Prediction>, VisionError>;
}
