use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("request to embedding service failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("embedding service returned status {0}")]
    Status(u16),
    #[error("malformed embedding response: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("embedding service returned no data")]
    Empty,
    #[error("embedding service returned ragged token rows")]
    Shape,
    #[error("failed to encode crop: {0}")]
    Encode(#[source] image::ImageError),
}

/// Domain interface for turning one cropped box into a feature vector.
///
/// Implementations are stateless apart from process-wide handles
/// (HTTP client, parameters) and shareable across concurrent requests.
/// A failure here is recovered per box: the caller skips the crop.
pub trait EmbeddingExtractor: Send + Sync {
    fn embed(&self, crop: &RgbImage) -> Result<Vec<f32>, EmbeddingError>;
}

/// Scale `v` to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
