use image::RgbImage;

use crate::grouping::domain::image_preprocessor::ImagePreprocessor;
use crate::shared::constants::LUMINANCE_BLUR_KERNEL;

const LUMA_EPS: f32 = 1e-6;

/// Flattens uneven shelf lighting by dividing each pixel's luminance by
/// a heavily blurred copy of the luminance plane, then rescaling so the
/// image keeps its original mean brightness. Crops taken afterwards
/// compare on packaging rather than on which shelf level they sat under.
pub struct LuminancePreprocessor {
    kernel_size: usize,
}

impl LuminancePreprocessor {
    pub fn new() -> Self {
        Self {
            kernel_size: LUMINANCE_BLUR_KERNEL,
        }
    }
}

impl Default for LuminancePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePreprocessor for LuminancePreprocessor {
    fn preprocess(&self, image: &RgbImage) -> RgbImage {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width == 0 || height == 0 {
            return image.clone();
        }

        let luma: Vec<f32> = image
            .pixels()
            .map(|p| 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32)
            .collect();

        // The kernel must stay odd and no wider than the image.
        let max_dim = width.min(height);
        let mut kernel_size = self.kernel_size.min(max_dim);
        if kernel_size % 2 == 0 {
            kernel_size = kernel_size.saturating_sub(1);
        }
        if kernel_size <= 1 {
            return image.clone();
        }

        let mut blurred = luma.clone();
        let kernel = gaussian_kernel_1d(kernel_size);
        separable_blur_f32(&mut blurred, width, height, &kernel);

        let mean_luma = luma.iter().sum::<f32>() / luma.len() as f32;
        let mut out = RgbImage::new(width as u32, height as u32);
        for (i, (src, dst)) in image.pixels().zip(out.pixels_mut()).enumerate() {
            let ratio = luma[i] / (blurred[i] + LUMA_EPS);
            let target = ratio * mean_luma;
            let scale = if luma[i] > LUMA_EPS {
                target / luma[i]
            } else {
                1.0
            };
            for c in 0..3 {
                dst.0[c] = (src.0[c] as f32 * scale).round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }
}

/// Precompute a 1D Gaussian kernel of the given size.
///
/// `kernel_size` must be odd and >= 1. Sigma is derived as `kernel_size / 6.0`
/// (matching OpenCV's sigma=0 convention).
fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let mut kernel_f64: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel_f64.iter().sum();
    for v in &mut kernel_f64 {
        *v /= sum;
    }
    kernel_f64.iter().map(|&v| v as f32).collect()
}

/// Separable Gaussian blur over a single-channel float plane, clamping
/// at the edges.
fn separable_blur_f32(data: &mut [f32], width: usize, height: usize, kernel: &[f32]) {
    let kernel_size = kernel.len();
    if kernel_size <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = kernel_size / 2;
    let mut temp = vec![0.0f32; width * height];

    // Horizontal pass: data -> temp
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - half as isize)
                    .max(0)
                    .min((width - 1) as isize) as usize;
                sum += data[y * width + sx] * w;
            }
            temp[y * width + x] = sum;
        }
    }

    // Vertical pass: temp -> data
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - half as isize)
                    .max(0)
                    .min((height - 1) as isize) as usize;
                sum += temp[sy * width + x] * w;
            }
            data[y * width + x] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn luma_of(p: &image::Rgb<u8>) -> f32 {
        0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32
    }

    #[test]
    fn test_kernel_sums_to_one() {
        let k = gaussian_kernel_1d(101);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_kernel_is_symmetric() {
        let k = gaussian_kernel_1d(7);
        for i in 0..k.len() / 2 {
            assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_blur_uniform_plane_unchanged() {
        let mut data = vec![50.0f32; 20 * 20];
        let kernel = gaussian_kernel_1d(7);
        separable_blur_f32(&mut data, 20, 20, &kernel);
        assert!(data.iter().all(|&v| (v - 50.0).abs() < 1e-3));
    }

    #[test]
    fn test_uniform_image_is_nearly_unchanged() {
        let image = RgbImage::from_pixel(64, 64, image::Rgb([120, 80, 60]));
        let out = LuminancePreprocessor::new().preprocess(&image);
        for (a, b) in image.pixels().zip(out.pixels()) {
            for c in 0..3 {
                assert!((a.0[c] as i32 - b.0[c] as i32).abs() <= 2);
            }
        }
    }

    #[test]
    fn test_dimensions_are_preserved() {
        let image = RgbImage::from_pixel(37, 53, image::Rgb([200, 200, 200]));
        let out = LuminancePreprocessor::new().preprocess(&image);
        assert_eq!(out.dimensions(), image.dimensions());
    }

    #[test]
    fn test_gradient_is_flattened() {
        // Horizontal brightness ramp; after normalization the spread of
        // per-pixel luminance should shrink.
        let image = RgbImage::from_fn(120, 40, |x, _| {
            let v = (40 + x) as u8;
            image::Rgb([v, v, v])
        });
        let out = LuminancePreprocessor::new().preprocess(&image);

        let variance = |img: &RgbImage| {
            let lumas: Vec<f32> = img.pixels().map(luma_of).collect();
            let mean = lumas.iter().sum::<f32>() / lumas.len() as f32;
            lumas.iter().map(|l| (l - mean).powi(2)).sum::<f32>() / lumas.len() as f32
        };
        assert!(variance(&out) < variance(&image));
    }

    #[test]
    fn test_tiny_image_falls_back_to_clone() {
        let image = RgbImage::from_pixel(1, 1, image::Rgb([10, 20, 30]));
        let out = LuminancePreprocessor::new().preprocess(&image);
        assert_eq!(out, image);
    }
}
