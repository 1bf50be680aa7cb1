//! SSD-MobileNet object detection via ONNX Runtime
//!
//! The model takes a `[1, height, width, 3]` uint8 RGB tensor and emits
//! normalized `[ymin, xmin, ymax, xmax]` boxes with per-detection class
//! ids and scores, non-max suppression already applied in-graph.

use std::path::Path;

use opencv::core::Mat;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::{Detector, Prediction};
use crate::error::VisionError;
use crate::utils;

/// COCO class labels keyed by the model's class id. The id space has
/// gaps, so this is a lookup table rather than a dense array.
pub const COCO_CLASSES: &[(u32, &str)] = &[
    (1, "person"),
    (2, "bicycle"),
    (3, "car"),
    (4, "motorcycle"),
    (5, "airplane"),
    (6, "bus"),
    (7, "train"),
    (8, "truck"),
    (9, "boat"),
    (10, "traffic light"),
    (11, "fire hydrant"),
    (13, "stop sign"),
    (14, "parking meter"),
    (15, "bench"),
    (16, "bird"),
    (17, "cat"),
    (18, "dog"),
    (19, "horse"),
    (20, "sheep"),
    (21, "cow"),
    (22, "elephant"),
    (23, "bear"),
    (24, "zebra"),
    (25, "giraffe"),
    (27, "backpack"),
    (28, "umbrella"),
    (31, "handbag"),
    (32, "tie"),
    (33, "suitcase"),
    (34, "frisbee"),
    (35, "skis"),
    (36, "snowboard"),
    (37, "sports ball"),
    (38, "kite"),
    (39, "baseball bat"),
    (40, "baseball glove"),
    (41, "skateboard"),
    (42, "surfboard"),
    (43, "tennis racket"),
    (44, "bottle"),
    (46, "wine glass"),
    (47, "cup"),
    (48, "fork"),
    (49, "knife"),
    (50, "spoon"),
    (51, "bowl"),
    (52, "banana"),
    (53, "apple"),
    (54, "sandwich"),
    (55, "orange"),
    (56, "broccoli"),
    (57, "carrot"),
    (58, "hot dog"),
    (59, "pizza"),
    (60, "donut"),
    (61, "cake"),
    (62, "chair"),
    (63, "couch"),
    (64, "potted plant"),
    (65, "bed"),
    (67, "dining table"),
    (70, "toilet"),
    (72, "tv"),
    (73, "laptop"),
    (74, "mouse"),
    (75, "remote"),
    (76, "keyboard"),
    (77, "cell phone"),
    (78, "microwave"),
    (79, "oven"),
    (80, "toaster"),
    (81, "sink"),
    (82, "refrigerator"),
    (84, "book"),
    (85, "clock"),
    (86, "vase"),
    (87, "scissors"),
    (88, "teddy bear"),
    (89, "hair drier"),
    (90, "toothbrush"),
];

/// Look up the COCO label for a model class id.
pub fn coco_label(class_id: u32) -> Option<&'static str> {
    COCO_CLASSES
        .iter()
        .find(|(id, _)| *id == class_id)
        .map(|(_, label)| *label)
}

/// SSD-MobileNet detector backed by an ONNX Runtime session.
pub struct SsdModel {
    session: Session,
    boxes_output: String,
    classes_output: String,
    scores_output: String,
    num_output: Option<String>,
    max_detections: usize,
}

impl SsdModel {
    /// Load the model from an ONNX file.
    pub fn new(model_path: &Path, max_detections: usize) -> Result<Self, VisionError> {
        info!("Loading SSD-MobileNet model from: {:?}", model_path);

        ort::init()
            .with_name("argus")
            .commit()
            .map_err(|e| VisionError::Ort(format!("Failed to initialize ONNX Runtime: {}", e)))?;

        let session = Session::builder()
            .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| VisionError::Ort(format!("Failed to set execution providers: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VisionError::Ort(format!("Failed to set optimization level: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| VisionError::Model(format!("Failed to load model: {}", e)))?;

        let mut boxes_output = None;
        let mut classes_output = None;
        let mut scores_output = None;
        let mut num_output = None;
        for output in &session.outputs {
            let name = output.name.to_ascii_lowercase();
            if name.contains("box") {
                boxes_output = Some(output.name.clone());
            } else if name.contains("class") {
                classes_output = Some(output.name.clone());
            } else if name.contains("score") {
                scores_output = Some(output.name.clone());
            } else if name.contains("num") {
                num_output = Some(output.name.clone());
            }
        }

        let model = Self {
            boxes_output: boxes_output
                .ok_or_else(|| VisionError::Model("Model has no detection boxes output".to_string()))?,
            classes_output: classes_output
                .ok_or_else(|| VisionError::Model("Model has no detection classes output".to_string()))?,
            scores_output: scores_output
                .ok_or_else(|| VisionError::Model("Model has no detection scores output".to_string()))?,
            num_output,
            session,
            max_detections,
        };
        info!("SSD-MobileNet model loaded successfully");
        Ok(model)
    }
}

#[async_trait::async_trait]
impl Detector for SsdModel {
    async fn detect(&self, frame: &Mat) -> Result<Vec<Prediction>, VisionError> {
        let (pixels, width, height) = utils::mat_to_rgb_bytes(frame)?;
        let input = Tensor::from_array(([1usize, height as usize, width as usize, 3usize], pixels))
            .map_err(|e| VisionError::Ort(format!("Failed to build input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::Ort(format!("Inference failed: {}", e)))?;

        let (_, boxes) = outputs
            .get(self.boxes_output.as_str())
            .ok_or_else(|| VisionError::Ort(format!("Missing model output '{}'", self.boxes_output)))?
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Ort(format!("Failed to read detection boxes: {}", e)))?;
        let (_, classes) = outputs
            .get(self.classes_output.as_str())
            .ok_or_else(|| VisionError::Ort(format!("Missing model output '{}'", self.classes_output)))?
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Ort(format!("Failed to read detection classes: {}", e)))?;
        let (_, scores) = outputs
            .get(self.scores_output.as_str())
            .ok_or_else(|| VisionError::Ort(format!("Missing model output '{}'", self.scores_output)))?
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Ort(format!("Failed to read detection scores: {}", e)))?;

        let count = match &self.num_output {
            Some(name) => {
                let (_, num) = outputs
                    .get(name.as_str())
                    .ok_or_else(|| VisionError::Ort(format!("Missing model output '{}'", name)))?
                    .try_extract_tensor::<f32>()
                    .map_err(|e| VisionError::Ort(format!("Failed to read detection count: {}", e)))?;
                num.first().copied().unwrap_or(0.0) as usize
            }
            None => scores.len(),
        };

        let predictions = decode_detections(
            boxes,
            classes,
            scores,
            count,
            width as f32,
            height as f32,
            self.max_detections,
        );
        debug!("SSD inference produced {} detections", predictions.len());
        Ok(predictions)
    }
}

/// Convert raw model outputs into pixel-space predictions.
///
/// Boxes arrive normalized as `[ymin, xmin, ymax, xmax]` and leave as
/// `[x, y, width, height]` scaled to the frame. Scores pass through
/// untouched.
fn decode_detections(
    boxes: &[f32],
    classes: &[f32],
    scores: &[f32],
    count: usize,
    frame_width: f32,
    frame_height: f32,
    max_detections: usize,
) -> Vec<Prediction> {
    let limit = count
        .min(scores.len())
        .min(boxes.len() / 4)
        .min(max_detections);
    let mut predictions = Vec::with_capacity(limit);

    for i in 0..limit {
        let score = scores[i];
        let ymin = boxes[i * 4];
        let xmin = boxes[i * 4 + 1];
        let ymax = boxes[i * 4 + 2];
        let xmax = boxes[i * 4 + 3];
        if !score.is_finite()
            || !ymin.is_finite()
            || !xmin.is_finite()
            || !ymax.is_finite()
            || !xmax.is_finite()
        {
            debug!("Skipping detection {} with non-finite values", i);
            continue;
        }

        let class_id = classes.get(i).copied().unwrap_or(0.0) as u32;
        let class = coco_label(class_id).unwrap_or("unknown").to_string();
        predictions.push(Prediction {
            class,
            class_id,
            score,
            bbox: [
                xmin * frame_width,
                ymin * frame_height,
                (xmax - xmin) * frame_width,
                (ymax - ymin) * frame_height,
            ],
        });
    }

    predictions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coco_label_lookup() {
        assert_eq!(coco_label(1), Some("person"));
        assert_eq!(coco_label(18), Some("dog"));
        assert_eq!(coco_label(90), Some("toothbrush"));
    }

    #[test]
    fn test_coco_label_gaps() {
        // The 90-id space skips these ids.
        for id in [0, 12, 26, 29, 30, 45, 66, 68, 69, 71, 83, 91] {
            assert_eq!(coco_label(id), None, "id {} should be unmapped", id);
        }
    }

    #[test]
    fn test_coco_class_count() {
        assert_eq!(COCO_CLASSES.len(), 80);
    }

    #[test]
    fn test_decode_scales_boxes_to_pixels() {
        let boxes = [0.1, 0.2, 0.5, 0.6];
        let classes = [18.0];
        let scores = [0.9];
        let predictions = decode_detections(&boxes, &classes, &scores, 1, 640.0, 480.0, 20);

        assert_eq!(predictions.len(), 1);
        let p = &predictions[0];
        assert_eq!(p.class, "dog");
        assert_eq!(p.class_id, 18);
        assert_eq!(p.score, 0.9);
        assert_eq!(p.bbox, [128.0, 48.0, 256.0, 192.0]);
    }

    #[test]
    fn test_decode_respects_detection_count() {
        let boxes = [0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0];
        let classes = [1.0, 17.0];
        let scores = [0.9, 0.8];
        let predictions = decode_detections(&boxes, &classes, &scores, 1, 100.0, 100.0, 20);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].class, "person");
    }

    #[test]
    fn test_decode_caps_at_max_detections() {
        let boxes: Vec<f32> = (0..10).flat_map(|_| [0.0, 0.0, 0.5, 0.5]).collect();
        let classes = vec![1.0; 10];
        let scores = vec![0.9; 10];
        let predictions = decode_detections(&boxes, &classes, &scores, 10, 100.0, 100.0, 3);
        assert_eq!(predictions.len(), 3);
    }

    #[test]
    fn test_decode_skips_non_finite_values() {
        let boxes = [f32::NAN, 0.0, 0.5, 0.5, 0.1, 0.1, 0.2, 0.2];
        let classes = [1.0, 17.0];
        let scores = [0.9, 0.8];
        let predictions = decode_detections(&boxes, &classes, &scores, 2, 100.0, 100.0, 20);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].class, "cat");
    }

    #[test]
    fn test_decode_unknown_class_id() {
        let boxes = [0.0, 0.0, 0.5, 0.5];
        let classes = [12.0];
        let scores = [0.9];
        let predictions = decode_detections(&boxes, &classes, &scores, 1, 100.0, 100.0, 20);
        assert_eq!(predictions[0].class, "unknown");
        assert_eq!(predictions[0].class_id, 12);
    }

    #[test]
    fn test_decode_does_not_clamp_scores() {
        let boxes = [0.0, 0.0, 0.5, 0.5];
        let classes = [1.0];
        let scores = [1.5];
        let predictions = decode_detections(&boxes, &classes, &scores, 1, 100.0, 100.0, 20);
        assert_eq!(predictions[0].score, 1.5);
    }
}
