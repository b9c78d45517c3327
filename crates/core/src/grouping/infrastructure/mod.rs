pub mod engine_factory;
pub mod luminance;
pub mod pixel_embedder;
pub mod remote_embedder;
