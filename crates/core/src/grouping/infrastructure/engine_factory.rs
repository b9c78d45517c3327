use std::fmt;
use std::str::FromStr;

use crate::config::GroupingConfig;
use crate::grouping::domain::clusterer::Clusterer;
use crate::grouping::domain::dbscan::DbscanClusterer;
use crate::grouping::domain::distance::DistanceMetric;
use crate::grouping::domain::engine::GroupingEngine;
use crate::grouping::domain::hierarchy::HierarchyClusterer;
use crate::grouping::domain::image_preprocessor::ImagePreprocessor;
use crate::grouping::infrastructure::luminance::LuminancePreprocessor;
use crate::grouping::infrastructure::pixel_embedder::PixelEmbedder;
use crate::grouping::infrastructure::remote_embedder::{RemoteClipEmbedder, RemoteDinoEmbedder};

/// Which embedding family drives grouping. Each strategy fixes its own
/// distance metric and clusterer; only the tunables come from config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupingStrategy {
    #[default]
    Pixel,
    Clip,
    Dino,
}

impl FromStr for GroupingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pixel" => Ok(Self::Pixel),
            "clip" => Ok(Self::Clip),
            "dino" => Ok(Self::Dino),
            other => Err(format!(
                "unknown grouping strategy '{other}' (expected pixel, clip, or dino)"
            )),
        }
    }
}

impl fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pixel => "pixel",
            Self::Clip => "clip",
            Self::Dino => "dino",
        };
        f.write_str(name)
    }
}

/// Wire up a grouping engine for the chosen strategy.
///
/// - `pixel`: local downsampled-RGB embedding, Euclidean distance,
///   density hierarchy clusterer, optional luminance normalization.
/// - `clip`: remote pooled embedding, cosine distance, DBSCAN.
/// - `dino`: remote token embedding (mean-pooled), cosine distance,
///   density hierarchy clusterer.
///
/// Fails only when the remote HTTP client cannot be built.
pub fn create_grouping_engine(
    strategy: GroupingStrategy,
    config: &GroupingConfig,
) -> Result<GroupingEngine, reqwest::Error> {
    log::info!("building grouping engine with strategy '{strategy}'");
    let engine = match strategy {
        GroupingStrategy::Pixel => {
            let preprocessor: Option<Box<dyn ImagePreprocessor>> = if config.normalize_luminance {
                Some(Box::new(LuminancePreprocessor::new()))
            } else {
                None
            };
            GroupingEngine::new(
                Box::new(PixelEmbedder::new(config.downsample_resolution)),
                Box::new(HierarchyClusterer::new(
                    config.min_cluster_size,
                    config.min_samples,
                )),
                DistanceMetric::Euclidean,
                preprocessor,
            )
        }
        GroupingStrategy::Clip => {
            let embedder = RemoteClipEmbedder::new(&config.embedder_url, config.embedder_timeout)?;
            let clusterer: Box<dyn Clusterer> =
                Box::new(DbscanClusterer::new(config.dbscan_eps, config.min_samples));
            GroupingEngine::new(Box::new(embedder), clusterer, DistanceMetric::Cosine, None)
        }
        GroupingStrategy::Dino => {
            let embedder = RemoteDinoEmbedder::new(&config.embedder_url, config.embedder_timeout)?;
            GroupingEngine::new(
                Box::new(embedder),
                Box::new(HierarchyClusterer::new(
                    config.min_cluster_size,
                    config.min_samples,
                )),
                DistanceMetric::Cosine,
                None,
            )
        }
    };
    Ok(engine)
}
