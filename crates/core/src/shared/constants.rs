/// Label assigned to detections the clusterer could not place in any cluster.
pub const NOISE_LABEL: &str = "noise";

/// IoU at or above which two boxes in the same cluster are merged into one.
pub const DEFAULT_MERGE_IOU_THRESHOLD: f64 = 0.5;

/// Side length of the square crop used by the raw-pixel embedding strategy.
pub const DEFAULT_DOWNSAMPLE_RESOLUTION: u32 = 28;

/// Neighborhood radius for DBSCAN over cosine distance.
pub const DEFAULT_DBSCAN_EPS: f64 = 0.3;

pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;
pub const DEFAULT_MIN_SAMPLES: usize = 2;

/// Kernel size for the flat-field blur in luminance normalization.
/// Large on purpose: the blur estimates the illumination field, not detail.
pub const LUMINANCE_BLUR_KERNEL: usize = 101;

pub const DEFAULT_DETECTOR_URL: &str = "http://detector:5001/detect";
pub const DEFAULT_EMBEDDER_URL: &str = "http://embedder:5002/embed";

/// Per-stage timeout for calls to the detection and embedding services.
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 300;
