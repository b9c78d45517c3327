use image::{imageops, imageops::FilterType, RgbImage};

use crate::grouping::domain::embedding_extractor::{EmbeddingError, EmbeddingExtractor};

/// Raw-pixel embedding: downsample the crop to a fixed square and
/// flatten the scaled RGB values. Cheap, deterministic, and surprisingly
/// effective on shelf imagery where identical products share packaging.
pub struct PixelEmbedder {
    resolution: u32,
}

impl PixelEmbedder {
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution: resolution.max(1),
        }
    }
}

impl EmbeddingExtractor for PixelEmbedder {
    fn embed(&self, crop: &RgbImage) -> Result<Vec<f32>, EmbeddingError> {
        let resized = imageops::resize(crop, self.resolution, self.resolution, FilterType::Triangle);
        let features = resized
            .pixels()
            .flat_map(|p| p.0.iter().map(|&c| c as f32 / 255.0))
            .collect();
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_embedding_length_is_fixed_by_resolution() {
        let embedder = PixelEmbedder::new(28);
        let crop = RgbImage::from_pixel(300, 120, image::Rgb([10, 20, 30]));
        let v = embedder.embed(&crop).unwrap();
        assert_eq!(v.len(), 28 * 28 * 3);
    }

    #[test]
    fn test_values_are_scaled_to_unit_range() {
        let embedder = PixelEmbedder::new(8);
        let mut crop = RgbImage::new(16, 16);
        for (x, y, p) in crop.enumerate_pixels_mut() {
            *p = image::Rgb([(x * 16) as u8, (y * 16) as u8, 255]);
        }
        let v = embedder.embed(&crop).unwrap();
        assert!(v.iter().all(|&c| (0.0..=1.0).contains(&c)));
    }

    #[test]
    fn test_uniform_crop_embeds_uniformly() {
        let embedder = PixelEmbedder::new(4);
        let crop = RgbImage::from_pixel(50, 50, image::Rgb([102, 102, 102]));
        let v = embedder.embed(&crop).unwrap();
        for &c in &v {
            assert_relative_eq!(c, 102.0 / 255.0, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_identical_crops_embed_identically() {
        let embedder = PixelEmbedder::new(28);
        let crop = RgbImage::from_fn(40, 60, |x, y| image::Rgb([(x + y) as u8, x as u8, y as u8]));
        let a = embedder.embed(&crop).unwrap();
        let b = embedder.embed(&crop).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_one_pixel_crop_is_valid() {
        let embedder = PixelEmbedder::new(28);
        let crop = RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 128]));
        let v = embedder.embed(&crop).unwrap();
        assert_eq!(v.len(), 28 * 28 * 3);
    }
}
