use std::collections::BTreeMap;

use image::{imageops, RgbImage};
use thiserror::Error;

use crate::grouping::domain::clusterer::{cluster_label, Clusterer, ClusteringError};
use crate::grouping::domain::distance::{pairwise_distances, DistanceMetric};
use crate::grouping::domain::embedding_extractor::{EmbeddingError, EmbeddingExtractor};
use crate::grouping::domain::image_preprocessor::ImagePreprocessor;
use crate::shared::bbox::BoundingBox;

#[derive(Error, Debug)]
pub enum GroupingError {
    #[error("no valid crops to cluster")]
    NoValidInput,
    #[error(transparent)]
    Clustering(#[from] ClusteringError),
}

/// Why a box was excluded from clustering.
#[derive(Error, Debug)]
pub enum SkipReason {
    #[error("box lies outside the image bounds")]
    OutOfBounds,
    #[error("box has no integer pixel area")]
    Degenerate,
    #[error("embedding failed: {0}")]
    Embedding(#[source] EmbeddingError),
}

/// Per-box result of the crop/embed step. The valid subset for
/// clustering is this explicit structure, not a side effect of
/// control flow.
pub enum CropOutcome {
    Embedded(Vec<f32>),
    Skipped(SkipReason),
}

/// Cluster label per valid detection index. Indices whose crop was
/// skipped are absent. Labels are stable only within one request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterAssignment {
    labels: BTreeMap<usize, String>,
}

impl ClusterAssignment {
    pub fn from_ids(valid_indices: &[usize], ids: &[i32]) -> Self {
        debug_assert_eq!(valid_indices.len(), ids.len());
        let labels = valid_indices
            .iter()
            .zip(ids.iter())
            .map(|(&idx, &id)| (idx, cluster_label(id)))
            .collect();
        Self { labels }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().map(|(&i, l)| (i, l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Embedding-based grouping of detection boxes into product clusters.
///
/// Composition of a pluggable embedder, a distance metric, a clusterer,
/// and an optional whole-image preprocessor; the three shipped
/// strategies differ only in how these are wired (see the engine
/// factory).
pub struct GroupingEngine {
    embedder: Box<dyn EmbeddingExtractor>,
    clusterer: Box<dyn Clusterer>,
    metric: DistanceMetric,
    preprocessor: Option<Box<dyn ImagePreprocessor>>,
}

impl GroupingEngine {
    pub fn new(
        embedder: Box<dyn EmbeddingExtractor>,
        clusterer: Box<dyn Clusterer>,
        metric: DistanceMetric,
        preprocessor: Option<Box<dyn ImagePreprocessor>>,
    ) -> Self {
        Self {
            embedder,
            clusterer,
            metric,
            preprocessor,
        }
    }

    /// Assign a cluster label to every box with a valid crop.
    ///
    /// Boxes that fail cropping or embedding are skipped and absent
    /// from the result; zero valid crops is an error. Clustering runs
    /// over valid crops only, so cluster ids index into the valid
    /// subset, never the raw box list.
    pub fn group(
        &self,
        image: &RgbImage,
        boxes: &[BoundingBox],
    ) -> Result<ClusterAssignment, GroupingError> {
        let processed;
        let image = match &self.preprocessor {
            Some(p) => {
                processed = p.preprocess(image);
                &processed
            }
            None => image,
        };

        let outcomes: Vec<CropOutcome> = boxes
            .iter()
            .map(|bbox| self.embed_box(image, bbox))
            .collect();

        let mut features = Vec::new();
        let mut valid_indices = Vec::new();
        for (index, outcome) in outcomes.iter().enumerate() {
            match outcome {
                CropOutcome::Embedded(v) => {
                    features.push(v.clone());
                    valid_indices.push(index);
                }
                CropOutcome::Skipped(reason) => {
                    log::warn!("skipping box {index}: {reason}");
                }
            }
        }

        if features.is_empty() {
            return Err(GroupingError::NoValidInput);
        }
        log::info!(
            "grouping {} of {} boxes ({} skipped)",
            valid_indices.len(),
            boxes.len(),
            boxes.len() - valid_indices.len()
        );

        let distances = pairwise_distances(&features, self.metric);
        let ids = self.clusterer.cluster(&distances)?;
        Ok(ClusterAssignment::from_ids(&valid_indices, &ids))
    }

    fn embed_box(&self, image: &RgbImage, bbox: &BoundingBox) -> CropOutcome {
        let (x, y, w, h) = match pixel_rect(bbox, image.width(), image.height()) {
            Ok(rect) => rect,
            Err(reason) => return CropOutcome::Skipped(reason),
        };
        let crop = imageops::crop_imm(image, x, y, w, h).to_image();
        match self.embedder.embed(&crop) {
            Ok(v) => CropOutcome::Embedded(v),
            Err(e) => CropOutcome::Skipped(SkipReason::Embedding(e)),
        }
    }
}

/// Truncate box coordinates to integer pixels and validate them against
/// the image dimensions.
fn pixel_rect(
    bbox: &BoundingBox,
    img_w: u32,
    img_h: u32,
) -> Result<(u32, u32, u32, u32), SkipReason> {
    let x1 = bbox.x1.trunc() as i64;
    let y1 = bbox.y1.trunc() as i64;
    let x2 = bbox.x2.trunc() as i64;
    let y2 = bbox.y2.trunc() as i64;

    if x2 <= x1 || y2 <= y1 {
        return Err(SkipReason::Degenerate);
    }
    if x1 < 0 || y1 < 0 || x2 > img_w as i64 || y2 > img_h as i64 {
        return Err(SkipReason::OutOfBounds);
    }
    Ok((x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
}
