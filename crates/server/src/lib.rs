//! HTTP surface for the shelf-scan pipeline.
//!
//! One stateless endpoint, `POST /process`, runs the full
//! detect → group → merge pipeline on an uploaded image. The pipeline
//! itself is synchronous; handlers push it onto the blocking pool.

mod handlers;
mod settings;
mod types;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use shelfscan_core::gateway::infrastructure::http_detection_gateway::HttpDetectionGateway;
use shelfscan_core::grouping::infrastructure::engine_factory::create_grouping_engine;
use shelfscan_core::pipeline::process_image_use_case::ProcessImageUseCase;

pub use handlers::*;
pub use settings::Settings;
pub use types::*;

/// Shared state: the pipeline is immutable after startup and serves all
/// requests concurrently.
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<ProcessImageUseCase>,
}

impl ApiState {
    /// Assemble the pipeline from settings. Fails when an HTTP client
    /// cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        let config = &settings.pipeline;
        let gateway = HttpDetectionGateway::new(&config.detector_url, config.detector_timeout)?;
        let grouping = create_grouping_engine(settings.strategy, &config.grouping)?;
        let pipeline =
            ProcessImageUseCase::new(Box::new(gateway), grouping, config.merge_iou_threshold);
        Ok(Self {
            pipeline: Arc::new(pipeline),
        })
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/process", post(process_image))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("starting shelfscan server on {addr}");
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
