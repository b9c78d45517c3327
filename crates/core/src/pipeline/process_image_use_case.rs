use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::gateway::domain::detection_gateway::DetectionGateway;
use crate::grouping::domain::engine::{ClusterAssignment, GroupingEngine};
use crate::merging::box_merger::merge_detections;
use crate::pipeline::error::PipelineError;
use crate::shared::constants::NOISE_LABEL;
use crate::shared::detection::{Detection, MergedDetection};

/// Cluster statistics computed before merging, so counts reflect
/// individual products rather than merged regions.
///
/// `cluster_counts` buckets every pre-merge detection by its final
/// label, passthrough detector labels included. `total_clusters` is
/// derived from the grouping output alone: a detection whose crop was
/// skipped keeps its detector label, and that label is never a cluster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub cluster_counts: BTreeMap<String, usize>,
    pub total_clusters: usize,
}

impl Metadata {
    fn from_stages(labeled: &[Detection], assignment: &ClusterAssignment) -> Self {
        let mut cluster_counts: BTreeMap<String, usize> = BTreeMap::new();
        for det in labeled {
            *cluster_counts.entry(det.label.clone()).or_insert(0) += 1;
        }
        let total_clusters = assignment
            .iter()
            .map(|(_, label)| label)
            .filter(|&label| label != NOISE_LABEL)
            .collect::<BTreeSet<_>>()
            .len();
        Self {
            cluster_counts,
            total_clusters,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub detections: Vec<MergedDetection>,
    pub metadata: Metadata,
}

/// Full shelf-scan pipeline: detect → group → merge.
///
/// One instance serves many requests; all state lives on the stack of
/// `execute`. Stages run strictly in order and any stage failure aborts
/// the rest, with one exception: zero detections from the gateway
/// short-circuits to an empty success instead of running grouping on
/// nothing.
pub struct ProcessImageUseCase {
    gateway: Box<dyn DetectionGateway>,
    grouping: GroupingEngine,
    merge_iou_threshold: f64,
}

impl ProcessImageUseCase {
    pub fn new(
        gateway: Box<dyn DetectionGateway>,
        grouping: GroupingEngine,
        merge_iou_threshold: f64,
    ) -> Self {
        Self {
            gateway,
            grouping,
            merge_iou_threshold,
        }
    }

    pub fn execute(&self, image_bytes: &[u8]) -> Result<ProcessOutcome, PipelineError> {
        // Decode up front so bad input fails before any network call.
        // The raw bytes still go to the detector verbatim; the decoded
        // image is reused for cropping.
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| PipelineError::Validation(format!("could not decode image: {e}")))?
            .to_rgb8();

        log::info!("detection stage: requesting detections");
        let detections = self
            .gateway
            .detect(image_bytes)
            .map_err(|source| PipelineError::Upstream {
                stage: "detection",
                source,
            })?;
        log::info!("detection stage: {} detections", detections.len());

        if detections.is_empty() {
            return Ok(ProcessOutcome {
                detections: Vec::new(),
                metadata: Metadata::default(),
            });
        }

        log::info!("grouping stage: clustering {} boxes", detections.len());
        let boxes: Vec<_> = detections.iter().map(|d| d.bbox).collect();
        let assignment = self.grouping.group(&image, &boxes)?;

        // Detections without an assignment keep their detector label;
        // they failed cropping and carry no cluster identity.
        let labeled: Vec<Detection> = detections
            .iter()
            .enumerate()
            .map(|(i, det)| match assignment.get(i) {
                Some(label) => det.with_label(label),
                None => det.clone(),
            })
            .collect();
        let metadata = Metadata::from_stages(&labeled, &assignment);
        log::info!(
            "grouping stage: {} clusters over {} labeled detections",
            metadata.total_clusters,
            labeled.len()
        );

        log::info!("merging stage: threshold {}", self.merge_iou_threshold);
        let merged = merge_detections(&labeled, self.merge_iou_threshold);

        Ok(ProcessOutcome {
            detections: merged,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::domain::detection_gateway::GatewayError;
    use crate::grouping::domain::clusterer::{Clusterer, ClusteringError};
    use crate::grouping::domain::distance::DistanceMetric;
    use crate::grouping::domain::embedding_extractor::{EmbeddingError, EmbeddingExtractor};
    use crate::shared::bbox::BoundingBox;
    use image::RgbImage;
    use ndarray::Array2;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // --- Stubs ---

    struct FixedGateway {
        detections: Vec<Detection>,
    }

    impl DetectionGateway for FixedGateway {
        fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>, GatewayError> {
            Ok(self.detections.clone())
        }
    }

    struct FailingGateway;

    impl DetectionGateway for FailingGateway {
        fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>, GatewayError> {
            Err(GatewayError::Status(502))
        }
    }

    struct CountingEmbedder {
        calls: Arc<AtomicUsize>,
    }

    impl EmbeddingExtractor for CountingEmbedder {
        fn embed(&self, _crop: &RgbImage) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }
    }

    struct FixedClusterer {
        ids: Vec<i32>,
    }

    impl Clusterer for FixedClusterer {
        fn cluster(&self, _distances: &Array2<f64>) -> Result<Vec<i32>, ClusteringError> {
            Ok(self.ids.clone())
        }
    }

    // --- Helpers ---

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(w, h, image::Rgb([90, 90, 90]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn det(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection::new(BoundingBox::new(x1, y1, x2, y2), "product", 0.9)
    }

    fn use_case(
        gateway: Box<dyn DetectionGateway>,
        ids: Vec<i32>,
    ) -> (ProcessImageUseCase, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let grouping = GroupingEngine::new(
            Box::new(CountingEmbedder {
                calls: calls.clone(),
            }),
            Box::new(FixedClusterer { ids }),
            DistanceMetric::Euclidean,
            None,
        );
        (ProcessImageUseCase::new(gateway, grouping, 0.5), calls)
    }

    // --- Tests ---

    #[test]
    fn test_undecodable_bytes_fail_validation() {
        let (uc, calls) = use_case(Box::new(FixedGateway { detections: vec![] }), vec![]);
        let err = uc.execute(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(err.is_client_error());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_detections_short_circuits() {
        let (uc, calls) = use_case(Box::new(FixedGateway { detections: vec![] }), vec![]);
        let outcome = uc.execute(&png_bytes(100, 100)).unwrap();
        assert!(outcome.detections.is_empty());
        assert!(outcome.metadata.cluster_counts.is_empty());
        assert_eq!(outcome.metadata.total_clusters, 0);
        // Grouping never ran.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_gateway_failure_is_upstream_error() {
        let (uc, _) = use_case(Box::new(FailingGateway), vec![]);
        let err = uc.execute(&png_bytes(100, 100)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Upstream {
                stage: "detection",
                ..
            }
        ));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_happy_path_counts_and_merges() {
        let gateway = FixedGateway {
            detections: vec![
                det(0.0, 0.0, 10.0, 10.0),
                det(1.0, 1.0, 11.0, 11.0),
                det(50.0, 50.0, 60.0, 60.0),
            ],
        };
        let (uc, _) = use_case(Box::new(gateway), vec![0, 0, -1]);
        let outcome = uc.execute(&png_bytes(100, 100)).unwrap();

        // Two cluster_0 boxes overlap heavily and merge; the noise box stands.
        assert_eq!(outcome.detections.len(), 2);
        assert_eq!(outcome.detections[0].label, "cluster_0");
        assert_eq!(
            outcome.detections[0].bbox,
            BoundingBox::new(0.0, 0.0, 11.0, 11.0)
        );
        assert_eq!(outcome.detections[1].label, "noise");

        // Counts are pre-merge.
        assert_eq!(outcome.metadata.cluster_counts["cluster_0"], 2);
        assert_eq!(outcome.metadata.cluster_counts["noise"], 1);
        assert_eq!(outcome.metadata.total_clusters, 1);
    }

    #[test]
    fn test_unassigned_detection_keeps_detector_label() {
        let gateway = FixedGateway {
            detections: vec![
                det(0.0, 0.0, 10.0, 10.0),
                // Out of the 100x100 test image; crop is skipped.
                det(90.0, 90.0, 150.0, 150.0),
            ],
        };
        let (uc, _) = use_case(Box::new(gateway), vec![0]);
        let outcome = uc.execute(&png_bytes(100, 100)).unwrap();

        let labels: Vec<&str> = outcome
            .detections
            .iter()
            .map(|d| d.label.as_str())
            .collect();
        assert!(labels.contains(&"cluster_0"));
        assert!(labels.contains(&"product"));
        // The passthrough label is not a cluster.
        assert_eq!(outcome.metadata.total_clusters, 1);
        assert_eq!(outcome.metadata.cluster_counts["product"], 1);
    }

    #[test]
    fn test_passthrough_labels_never_count_as_clusters() {
        // Two skipped crops carry distinct detector labels; only the
        // grouping output contributes to total_clusters.
        let gateway = FixedGateway {
            detections: vec![
                det(0.0, 0.0, 10.0, 10.0),
                det(20.0, 20.0, 30.0, 30.0),
                Detection::new(BoundingBox::new(-50.0, 0.0, -10.0, 10.0), "shelf", 0.8),
                Detection::new(BoundingBox::new(200.0, 0.0, 300.0, 10.0), "tag", 0.7),
            ],
        };
        let (uc, _) = use_case(Box::new(gateway), vec![0, 0]);
        let outcome = uc.execute(&png_bytes(100, 100)).unwrap();

        assert_eq!(outcome.metadata.total_clusters, 1);
        assert_eq!(outcome.metadata.cluster_counts["cluster_0"], 2);
        assert_eq!(outcome.metadata.cluster_counts["shelf"], 1);
        assert_eq!(outcome.metadata.cluster_counts["tag"], 1);
    }

    #[test]
    fn test_all_crops_invalid_is_client_error() {
        let gateway = FixedGateway {
            detections: vec![det(500.0, 500.0, 600.0, 600.0)],
        };
        let (uc, _) = use_case(Box::new(gateway), vec![]);
        let err = uc.execute(&png_bytes(100, 100)).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidInput));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_embedder_called_once_per_detection() {
        let gateway = FixedGateway {
            detections: vec![det(0.0, 0.0, 10.0, 10.0), det(20.0, 20.0, 40.0, 40.0)],
        };
        let (uc, calls) = use_case(Box::new(gateway), vec![0, 1]);
        uc.execute(&png_bytes(100, 100)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_all_noise_has_zero_clusters() {
        let gateway = FixedGateway {
            detections: vec![det(0.0, 0.0, 10.0, 10.0), det(50.0, 50.0, 60.0, 60.0)],
        };
        let (uc, _) = use_case(Box::new(gateway), vec![-1, -1]);
        let outcome = uc.execute(&png_bytes(100, 100)).unwrap();
        assert_eq!(outcome.metadata.total_clusters, 0);
        assert_eq!(outcome.metadata.cluster_counts["noise"], 2);
        assert_eq!(outcome.detections.len(), 2);
    }

    #[test]
    fn test_outcome_serializes_to_wire_shape() {
        let outcome = ProcessOutcome {
            detections: vec![MergedDetection {
                bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
                label: "cluster_0".to_string(),
            }],
            metadata: Metadata {
                cluster_counts: [("cluster_0".to_string(), 1), ("noise".to_string(), 1)]
                    .into_iter()
                    .collect(),
                total_clusters: 1,
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["detections"][0]["bbox"], serde_json::json!([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(json["metadata"]["total_clusters"], 1);
        assert_eq!(json["metadata"]["cluster_counts"]["noise"], 1);
    }
}
