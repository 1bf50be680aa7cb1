//! Overlay element set kept in sync with the latest detections
//!
//! Every admitted detection owns exactly two nodes: a text label and a
//! highlight box, in that order. Synchronization diffs the desired set
//! against the current one in place instead of rebuilding it, so an
//! unchanged frame produces zero mutations.

use crate::models::Prediction;

/// Text annotation for one detection.
///
/// `margin_left`/`margin_top` anchor the label to the top-left corner of
/// its highlight box and `width` matches the box width, so the text never
/// overflows its detection.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelNode {
    pub text: String,
    pub margin_left: f32,
    pub margin_top: f32,
    pub width: f32,
}

/// Rectangle annotation for one detection, in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxNode {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayNode {
    Label(LabelNode),
    Highlight(BoxNode),
}

/// Mutation counters for one synchronization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Detections that passed the score threshold
    pub admitted: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Render text for a detection label: class name and rounded percentage.
pub fn label_text(class: &str, score: f32) -> String {
    format!("{} - {}%", class, (score * 100.0).round() as i64)
}

/// Ordered set of overlay nodes for the current frame.
#[derive(Debug, Default)]
pub struct Overlay {
    nodes: Vec<OverlayNode>,
}

impl Overlay {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn nodes(&self) -> &[OverlayNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Reconcile the node set with `predictions`.
    ///
    /// Detections whose score does not exceed `threshold` are ignored.
    /// Node order follows prediction order, label before highlight, and
    /// positions are patched in place. Calling this twice with the same
    /// predictions reports zero mutations the second time.
    pub fn sync(&mut self, predictions: &[Prediction], threshold: f32) -> SyncStats {
        let mut stats = SyncStats::default();
        let mut desired = Vec::with_capacity(predictions.len() * 2);

        for prediction in predictions {
            if !(prediction.score > threshold) {
                continue;
            }
            stats.admitted += 1;
            let [x, y, width, height] = prediction.bbox;
            desired.push(OverlayNode::Label(LabelNode {
                text: label_text(&prediction.class, prediction.score),
                margin_left: x,
                margin_top: y,
                width,
            }));
            desired.push(OverlayNode::Highlight(BoxNode {
                left: x,
                top: y,
                width,
                height,
            }));
        }

        let wanted = desired.len();
        for (index, node) in desired.into_iter().enumerate() {
            match self.nodes.get_mut(index) {
                Some(existing) => {
                    if *existing != node {
                        *existing = node;
                        stats.updated += 1;
                    }
                }
                None => {
                    self.nodes.push(node);
                    stats.created += 1;
                }
            }
        }
        if self.nodes.len() > wanted {
            stats.removed = self.nodes.len() - wanted;
            self.nodes.truncate(wanted);
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(class: &str, score: f32, bbox: [f32; 4]) -> Prediction {
        Prediction {
            class: class.to_string(),
            class_id: 0,
            score,
            bbox,
        }
    }

    #[test]
    fn test_label_text_format() {
        assert_eq!(label_text("dog", 0.9), "dog - 90%");
        assert_eq!(label_text("person", 0.625), "person - 63%");
        assert_eq!(label_text("cat", 1.0), "cat - 100%");
    }

    #[test]
    fn test_sync_creates_label_and_highlight_per_detection() {
        let mut overlay = Overlay::new();
        let stats = overlay.sync(&[prediction("dog", 0.9, [10.0, 20.0, 100.0, 50.0])], 0.6);

        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.created, 2);
        assert_eq!(overlay.len(), 2);
        match &overlay.nodes()[0] {
            OverlayNode::Label(label) => {
                assert_eq!(label.text, "dog - 90%");
                assert_eq!(label.margin_left, 10.0);
                assert_eq!(label.margin_top, 20.0);
                assert_eq!(label.width, 100.0);
            }
            other => panic!("Expected label first, got {:?}", other),
        }
        match &overlay.nodes()[1] {
            OverlayNode::Highlight(bbox) => {
                assert_eq!(bbox.left, 10.0);
                assert_eq!(bbox.top, 20.0);
                assert_eq!(bbox.width, 100.0);
                assert_eq!(bbox.height, 50.0);
            }
            other => panic!("Expected highlight second, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_requires_score_strictly_above_threshold() {
        let mut overlay = Overlay::new();
        let stats = overlay.sync(
            &[
                prediction("dog", 0.6, [0.0, 0.0, 1.0, 1.0]),
                prediction("cat", 0.61, [0.0, 0.0, 1.0, 1.0]),
                prediction("bird", 0.2, [0.0, 0.0, 1.0, 1.0]),
            ],
            0.6,
        );

        assert_eq!(stats.admitted, 1);
        assert_eq!(overlay.len(), 2);
        match &overlay.nodes()[0] {
            OverlayNode::Label(label) => assert!(label.text.starts_with("cat")),
            other => panic!("Expected label, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_preserves_prediction_order() {
        let mut overlay = Overlay::new();
        overlay.sync(
            &[
                prediction("person", 0.7, [0.0, 0.0, 10.0, 10.0]),
                prediction("dog", 0.99, [5.0, 5.0, 10.0, 10.0]),
            ],
            0.6,
        );

        let labels: Vec<&str> = overlay
            .nodes()
            .iter()
            .filter_map(|node| match node {
                OverlayNode::Label(label) => Some(label.text.as_str()),
                OverlayNode::Highlight(_) => None,
            })
            .collect();
        assert_eq!(labels, vec!["person - 70%", "dog - 99%"]);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let predictions = vec![
            prediction("dog", 0.9, [10.0, 20.0, 100.0, 50.0]),
            prediction("cat", 0.8, [200.0, 40.0, 60.0, 80.0]),
        ];
        let mut overlay = Overlay::new();

        let first = overlay.sync(&predictions, 0.6);
        assert_eq!(first.created, 4);

        let second = overlay.sync(&predictions, 0.6);
        assert_eq!(second.admitted, 2);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.removed, 0);
        assert_eq!(overlay.len(), 4);
    }

    #[test]
    fn test_sync_patches_moved_detection_in_place() {
        let mut overlay = Overlay::new();
        overlay.sync(&[prediction("dog", 0.9, [10.0, 20.0, 100.0, 50.0])], 0.6);

        let stats = overlay.sync(&[prediction("dog", 0.9, [14.0, 22.0, 100.0, 50.0])], 0.6);
        assert_eq!(stats.created, 0);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.removed, 0);
        match &overlay.nodes()[1] {
            OverlayNode::Highlight(bbox) => assert_eq!(bbox.left, 14.0),
            other => panic!("Expected highlight, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_removes_stale_nodes() {
        let mut overlay = Overlay::new();
        overlay.sync(
            &[
                prediction("dog", 0.9, [0.0, 0.0, 10.0, 10.0]),
                prediction("cat", 0.8, [20.0, 0.0, 10.0, 10.0]),
            ],
            0.6,
        );
        assert_eq!(overlay.len(), 4);

        let stats = overlay.sync(&[prediction("dog", 0.9, [0.0, 0.0, 10.0, 10.0])], 0.6);
        assert_eq!(stats.removed, 2);
        assert_eq!(overlay.len(), 2);

        let stats = overlay.sync(&[], 0.6);
        assert_eq!(stats.removed, 2);
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_sync_ignores_nan_scores() {
        let mut overlay = Overlay::new();
        let stats = overlay.sync(&[prediction("dog", f32::NAN, [0.0, 0.0, 1.0, 1.0])], 0.6);
        assert_eq!(stats.admitted, 0);
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut overlay = Overlay::new();
        overlay.sync(&[prediction("dog", 0.9, [0.0, 0.0, 1.0, 1.0])], 0.6);
        overlay.clear();
        assert!(overlay.is_empty());
    }
}
