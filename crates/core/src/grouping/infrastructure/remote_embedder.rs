use std::io::Cursor;
use std::time::Duration;

use image::{ImageFormat, RgbImage};
use ndarray::{Array2, Axis};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::grouping::domain::embedding_extractor::{
    l2_normalize, EmbeddingError, EmbeddingExtractor,
};

/// CLIP-style embedding service client. Posts each crop as a PNG and
/// reads back a single pooled vector.
pub struct RemoteClipEmbedder {
    client: Client,
    url: String,
}

impl RemoteClipEmbedder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl EmbeddingExtractor for RemoteClipEmbedder {
    fn embed(&self, crop: &RgbImage) -> Result<Vec<f32>, EmbeddingError> {
        let body = post_crop(&self.client, &self.url, crop)?;
        let mut embedding = parse_embedding(&body)?;
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// DINO-style embedding service client. The service returns per-patch
/// token vectors; we mean-pool them into one crop descriptor.
pub struct RemoteDinoEmbedder {
    client: Client,
    url: String,
}

impl RemoteDinoEmbedder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl EmbeddingExtractor for RemoteDinoEmbedder {
    fn embed(&self, crop: &RgbImage) -> Result<Vec<f32>, EmbeddingError> {
        let body = post_crop(&self.client, &self.url, crop)?;
        let tokens = parse_tokens(&body)?;
        let mut pooled = mean_pool(&tokens)?;
        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

/// Encode the crop as PNG and post it as multipart field `image`.
fn post_crop(client: &Client, url: &str, crop: &RgbImage) -> Result<String, EmbeddingError> {
    let mut png = Vec::new();
    crop.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(EmbeddingError::Encode)?;

    let part = Part::bytes(png)
        .file_name("crop.png")
        .mime_str("image/png")
        .map_err(EmbeddingError::Request)?;
    let form = Form::new().part("image", part);

    let response = client
        .post(url)
        .multipart(form)
        .send()
        .map_err(EmbeddingError::Request)?;

    let status = response.status();
    if !status.is_success() {
        return Err(EmbeddingError::Status(status.as_u16()));
    }
    response.text().map_err(EmbeddingError::Request)
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TokensResponse {
    tokens: Vec<Vec<f32>>,
}

pub fn parse_embedding(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let parsed: EmbeddingResponse =
        serde_json::from_str(body).map_err(EmbeddingError::Malformed)?;
    if parsed.embedding.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    Ok(parsed.embedding)
}

pub fn parse_tokens(body: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let parsed: TokensResponse = serde_json::from_str(body).map_err(EmbeddingError::Malformed)?;
    if parsed.tokens.is_empty() || parsed.tokens[0].is_empty() {
        return Err(EmbeddingError::Empty);
    }
    let dim = parsed.tokens[0].len();
    if parsed.tokens.iter().any(|row| row.len() != dim) {
        return Err(EmbeddingError::Shape);
    }
    Ok(parsed.tokens)
}

fn mean_pool(tokens: &[Vec<f32>]) -> Result<Vec<f32>, EmbeddingError> {
    let rows = tokens.len();
    let dim = tokens[0].len();
    let flat: Vec<f32> = tokens.iter().flatten().copied().collect();
    let matrix = Array2::from_shape_vec((rows, dim), flat).map_err(|_| EmbeddingError::Shape)?;
    let pooled = matrix.mean_axis(Axis(0)).ok_or(EmbeddingError::Empty)?;
    Ok(pooled.to_vec())
}
