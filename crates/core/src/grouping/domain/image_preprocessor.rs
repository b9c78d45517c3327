use image::RgbImage;

/// Whole-image preprocessing applied before cropping.
///
/// Infallible by contract: implementations fall back to the input
/// image when their correction cannot be computed.
pub trait ImagePreprocessor: Send + Sync {
    fn preprocess(&self, image: &RgbImage) -> RgbImage;
}
