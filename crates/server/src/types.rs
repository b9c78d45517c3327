//! Wire types for the HTTP surface.

use serde::{Deserialize, Serialize};
use shelfscan_core::pipeline::process_image_use_case::ProcessOutcome;
use shelfscan_core::shared::detection::MergedDetection;

/// Body of a successful `POST /process`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub detections: Vec<MergedDetection>,
    pub metadata: MetadataBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataBody {
    pub cluster_counts: std::collections::BTreeMap<String, usize>,
    pub total_clusters: usize,
}

impl From<ProcessOutcome> for ProcessResponse {
    fn from(outcome: ProcessOutcome) -> Self {
        Self {
            detections: outcome.detections,
            metadata: MetadataBody {
                cluster_counts: outcome.metadata.cluster_counts,
                total_clusters: outcome.metadata.total_clusters,
            },
        }
    }
}

/// Error body. Messages are generic categories; causes stay in the logs.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
