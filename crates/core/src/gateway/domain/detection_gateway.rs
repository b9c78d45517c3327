use thiserror::Error;

use crate::shared::detection::Detection;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request to detection service failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("detection service returned status {0}")]
    Status(u16),
    #[error("malformed detection response: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Domain interface for the external object-detection service.
///
/// Implementations receive the original image bytes verbatim and return
/// raw detections. Pure I/O boundary; stateless, shareable across
/// concurrent requests.
pub trait DetectionGateway: Send + Sync {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, GatewayError>;
}
