//! Image-synthesis adapter.

use crate::http::{check_status, transport_error};
use async_trait::async_trait;
use base64::Engine as _;
use fabula_error::{FabulaResult, ModelOutputError, ModelOutputErrorKind};
use fabula_interface::ImageSynthesis;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

/// Client for `POST {endpoint}/v1/images/generations`.
///
/// The provider answers with base64-encoded image bytes in
/// `data[0].b64_json`; decoding happens here so callers only ever see raw
/// bytes.
#[derive(Debug, Clone)]
pub struct ImageModelClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ImageModelClient {
    /// Creates a new image synthesis client.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageSynthesis for ImageModelClient {
    #[instrument(skip(self, prompt), fields(model = %self.model, size = size))]
    async fn generate_image(
        &self,
        prompt: &str,
        size: &str,
        seed: Option<u64>,
    ) -> FabulaResult<Vec<u8>> {
        let request = ImageRequest {
            model: &self.model,
            prompt,
            size,
            seed,
        };

        let url = format!("{}/v1/images/generations", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("image generation", e))?;
        let response = check_status("image generation", response).await?;

        let parsed: ImageResponse = response.json().await.map_err(|e| {
            ModelOutputError::new(ModelOutputErrorKind::InvalidJson(format!(
                "image envelope: {e}"
            )))
        })?;

        let b64 = parsed
            .data
            .first()
            .and_then(|d| d.b64_json.as_deref())
            .ok_or_else(|| {
                ModelOutputError::new(ModelOutputErrorKind::MissingKey(
                    "data[0].b64_json".to_string(),
                ))
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| {
                ModelOutputError::new(ModelOutputErrorKind::Base64Decode(e.to_string()))
            })?;
        if bytes.is_empty() {
            return Err(ModelOutputError::new(ModelOutputErrorKind::EmptyPayload(
                "image payload decoded to zero bytes".to_string(),
            ))
            .into());
        }
        Ok(bytes)
    }
}
