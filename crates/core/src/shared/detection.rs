use serde::{Deserialize, Serialize};

use crate::shared::bbox::BoundingBox;

/// A raw detection from the detection service.
///
/// Immutable value object passed between pipeline stages by value.
/// `label` starts as the detector's class name and is rewritten to a
/// cluster label by the grouping stage; `score` is carried along but
/// dropped from merged output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    pub score: f64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, score: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            score,
        }
    }

    /// Same detection with the label replaced (used by the grouping stage).
    pub fn with_label(&self, label: impl Into<String>) -> Self {
        Self {
            bbox: self.bbox,
            label: label.into(),
            score: self.score,
        }
    }
}

/// Final pipeline output: the union box of one merge chain.
///
/// Merged boxes are synthetic unions and no longer trace 1:1 to raw
/// detections, but every contributing raw box belongs to exactly one
/// merged output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedDetection {
    pub bbox: BoundingBox,
    pub label: String,
}
