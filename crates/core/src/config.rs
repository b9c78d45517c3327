use std::time::Duration;

use crate::shared::constants::{
    DEFAULT_DBSCAN_EPS, DEFAULT_DETECTOR_URL, DEFAULT_DOWNSAMPLE_RESOLUTION,
    DEFAULT_EMBEDDER_URL, DEFAULT_MERGE_IOU_THRESHOLD, DEFAULT_MIN_CLUSTER_SIZE,
    DEFAULT_MIN_SAMPLES, DEFAULT_STAGE_TIMEOUT_SECS,
};

/// Tunables for the grouping stage.
#[derive(Clone, Debug)]
pub struct GroupingConfig {
    /// Embedding service endpoint (remote strategies only).
    pub embedder_url: String,
    pub embedder_timeout: Duration,
    pub min_cluster_size: usize,
    pub min_samples: usize,
    /// DBSCAN neighborhood radius (clip strategy).
    pub dbscan_eps: f64,
    /// Crop side length for the raw-pixel strategy.
    pub downsample_resolution: u32,
    /// Flat-field luminance correction before cropping (pixel strategy).
    pub normalize_luminance: bool,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            embedder_url: DEFAULT_EMBEDDER_URL.to_string(),
            embedder_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            min_samples: DEFAULT_MIN_SAMPLES,
            dbscan_eps: DEFAULT_DBSCAN_EPS,
            downsample_resolution: DEFAULT_DOWNSAMPLE_RESOLUTION,
            normalize_luminance: false,
        }
    }
}

/// Tunables for the whole pipeline; populated by the binaries from
/// CLI flags and environment variables.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub detector_url: String,
    pub detector_timeout: Duration,
    pub merge_iou_threshold: f64,
    pub grouping: GroupingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector_url: DEFAULT_DETECTOR_URL.to_string(),
            detector_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
            merge_iou_threshold: DEFAULT_MERGE_IOU_THRESHOLD,
            grouping: GroupingConfig::default(),
        }
    }
}
