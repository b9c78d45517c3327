use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::gateway::domain::detection_gateway::{DetectionGateway, GatewayError};
use crate::shared::detection::Detection;

/// Blocking HTTP client for the detection service.
///
/// Posts the image as a multipart form (field `image`) and parses the
/// `{"detections": [...]}` response. The request timeout is the
/// detection stage timeout; hitting it surfaces as a request error
/// like any other network failure.
pub struct HttpDetectionGateway {
    client: Client,
    url: String,
}

impl HttpDetectionGateway {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl DetectionGateway for HttpDetectionGateway {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, GatewayError> {
        let part = Part::bytes(image.to_vec())
            .file_name("image")
            .mime_str("application/octet-stream")
            .map_err(GatewayError::Request)?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(GatewayError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = response.text().map_err(GatewayError::Request)?;
        parse_detections(&body)
    }
}

#[derive(Deserialize)]
struct DetectionsResponse {
    detections: Vec<Detection>,
}

/// Parse the detection service response body.
///
/// Split out of the transport call so the wire contract is testable
/// without a live service.
pub fn parse_detections(body: &str) -> Result<Vec<Detection>, GatewayError> {
    let parsed: DetectionsResponse =
        serde_json::from_str(body).map_err(GatewayError::Malformed)?;
    Ok(parsed.detections)
}
