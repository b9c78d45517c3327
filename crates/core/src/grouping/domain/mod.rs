pub mod clusterer;
pub mod dbscan;
pub mod distance;
pub mod embedding_extractor;
pub mod engine;
pub mod hierarchy;
pub mod image_preprocessor;
