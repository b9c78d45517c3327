use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use shelfscan_core::config::{GroupingConfig, PipelineConfig};
use shelfscan_core::gateway::infrastructure::http_detection_gateway::HttpDetectionGateway;
use shelfscan_core::grouping::infrastructure::engine_factory::{
    create_grouping_engine, GroupingStrategy,
};
use shelfscan_core::pipeline::process_image_use_case::ProcessImageUseCase;
use shelfscan_core::shared::constants::{
    DEFAULT_DBSCAN_EPS, DEFAULT_DETECTOR_URL, DEFAULT_DOWNSAMPLE_RESOLUTION,
    DEFAULT_EMBEDDER_URL, DEFAULT_MERGE_IOU_THRESHOLD, DEFAULT_MIN_CLUSTER_SIZE,
    DEFAULT_MIN_SAMPLES, DEFAULT_STAGE_TIMEOUT_SECS,
};

/// Detect, group, and merge retail products in a shelf image.
#[derive(Parser)]
#[command(name = "shelfscan")]
struct Cli {
    /// Input shelf image.
    input: PathBuf,

    /// Grouping strategy: pixel, clip, or dino.
    #[arg(long, default_value = "pixel")]
    strategy: GroupingStrategy,

    /// Detection service endpoint.
    #[arg(long, default_value = DEFAULT_DETECTOR_URL)]
    detector_url: String,

    /// Embedding service endpoint (clip and dino strategies).
    #[arg(long, default_value = DEFAULT_EMBEDDER_URL)]
    embedder_url: String,

    /// Per-stage timeout in seconds for remote services.
    #[arg(long, default_value_t = DEFAULT_STAGE_TIMEOUT_SECS)]
    timeout: u64,

    /// IoU threshold for merging same-cluster boxes.
    #[arg(long, default_value_t = DEFAULT_MERGE_IOU_THRESHOLD)]
    merge_iou: f64,

    /// Minimum cluster size for the density hierarchy clusterer.
    #[arg(long, default_value_t = DEFAULT_MIN_CLUSTER_SIZE)]
    min_cluster_size: usize,

    /// Core-point neighborhood size.
    #[arg(long, default_value_t = DEFAULT_MIN_SAMPLES)]
    min_samples: usize,

    /// DBSCAN neighborhood radius (clip strategy).
    #[arg(long, default_value_t = DEFAULT_DBSCAN_EPS)]
    dbscan_eps: f64,

    /// Crop side length for the pixel strategy.
    #[arg(long, default_value_t = DEFAULT_DOWNSAMPLE_RESOLUTION)]
    resolution: u32,

    /// Flatten uneven shelf lighting before cropping (pixel strategy).
    #[arg(long)]
    normalize_luminance: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = PipelineConfig {
        detector_url: cli.detector_url,
        detector_timeout: Duration::from_secs(cli.timeout),
        merge_iou_threshold: cli.merge_iou,
        grouping: GroupingConfig {
            embedder_url: cli.embedder_url,
            embedder_timeout: Duration::from_secs(cli.timeout),
            min_cluster_size: cli.min_cluster_size,
            min_samples: cli.min_samples,
            dbscan_eps: cli.dbscan_eps,
            downsample_resolution: cli.resolution,
            normalize_luminance: cli.normalize_luminance,
        },
    };

    let image_bytes = std::fs::read(&cli.input)?;
    log::info!(
        "processing {} ({} bytes) with strategy '{}'",
        cli.input.display(),
        image_bytes.len(),
        cli.strategy
    );

    let gateway = HttpDetectionGateway::new(&config.detector_url, config.detector_timeout)?;
    let grouping = create_grouping_engine(cli.strategy, &config.grouping)?;
    let pipeline =
        ProcessImageUseCase::new(Box::new(gateway), grouping, config.merge_iou_threshold);

    let outcome = pipeline.execute(&image_bytes)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
