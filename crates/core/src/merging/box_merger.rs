use std::collections::HashMap;

use crate::shared::bbox::BoundingBox;
use crate::shared::constants::NOISE_LABEL;
use crate::shared::detection::{Detection, MergedDetection};

/// Collapse overlapping same-label detections into single boxes.
///
/// Within each label, boxes are folded greedily in input order: an
/// accumulator starts from the first unused box and absorbs (by
/// coordinate union) every later unused box whose IoU with the current
/// accumulator meets the threshold. Because the accumulator grows as it
/// absorbs, a chain of pairwise-overlapping boxes can collapse into one
/// even when its endpoints never overlap directly.
pub fn merge_detections(detections: &[Detection], iou_threshold: f64) -> Vec<MergedDetection> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<BoundingBox>> = HashMap::new();
    for det in detections {
        let label = if det.label.is_empty() {
            NOISE_LABEL
        } else {
            det.label.as_str()
        };
        groups.entry(label).or_insert_with(|| {
            order.push(label);
            Vec::new()
        });
        if let Some(boxes) = groups.get_mut(label) {
            boxes.push(det.bbox);
        }
    }

    let mut merged = Vec::new();
    for label in order {
        if let Some(boxes) = groups.get(label) {
            for bbox in merge_group(boxes, iou_threshold) {
                merged.push(MergedDetection {
                    bbox,
                    label: label.to_string(),
                });
            }
        }
    }
    log::info!(
        "merged {} detections into {} boxes",
        detections.len(),
        merged.len()
    );
    merged
}

fn merge_group(boxes: &[BoundingBox], iou_threshold: f64) -> Vec<BoundingBox> {
    let mut used = vec![false; boxes.len()];
    let mut out = Vec::new();

    for i in 0..boxes.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut acc = boxes[i];
        for j in (i + 1)..boxes.len() {
            if used[j] {
                continue;
            }
            if acc.iou(&boxes[j]) >= iou_threshold {
                acc = acc.union(&boxes[j]);
                used[j] = true;
            }
        }
        out.push(acc);
    }
    out
}
