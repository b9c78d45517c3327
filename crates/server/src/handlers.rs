//! HTTP request handlers.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, info};

use shelfscan_core::pipeline::error::PipelineError;

use crate::types::{ErrorResponse, HealthResponse, ProcessResponse};
use crate::ApiState;

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run the full pipeline on an uploaded shelf image.
///
/// Expects a multipart form with an `image` field. The pipeline is
/// synchronous (blocking HTTP to the detector and embedder), so it runs
/// on the blocking pool to keep the async workers free.
pub async fn process_image(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let mut image_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("failed to read image field: {e}")))?;
            image_bytes = Some(bytes);
            break;
        }
    }
    let image_bytes = image_bytes.ok_or_else(|| bad_request("No image provided".to_string()))?;
    info!("processing image of {} bytes", image_bytes.len());

    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.execute(&image_bytes))
        .await
        .map_err(|e| {
            error!("pipeline task panicked: {e}");
            internal_error()
        })?
        .map_err(map_pipeline_error)?;

    info!(
        "processed image: {} merged detections, {} clusters",
        outcome.detections.len(),
        outcome.metadata.total_clusters
    );
    Ok(Json(ProcessResponse::from(outcome)))
}

/// Map pipeline failures to status codes with generic messages. The
/// underlying cause is logged here and never sent to the client.
fn map_pipeline_error(err: PipelineError) -> (StatusCode, Json<ErrorResponse>) {
    match &err {
        PipelineError::Validation(_) | PipelineError::NoValidInput => {
            info!("rejecting request: {err}");
            bad_request(err.to_string())
        }
        PipelineError::Upstream { stage, source } => {
            error!("{stage} stage failed: {source}");
            internal_error()
        }
        PipelineError::Clustering(source) => {
            error!("clustering failed: {source}");
            internal_error()
        }
    }
}

fn bad_request(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

fn internal_error() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "processing failed".to_string(),
        }),
    )
}
