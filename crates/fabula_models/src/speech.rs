//! Speech-synthesis adapter.

use crate::http::{check_status, transport_error};
use async_trait::async_trait;
use base64::Engine as _;
use fabula_error::{FabulaResult, ModelOutputError, ModelOutputErrorKind};
use fabula_interface::SpeechSynthesis;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Serialize)]
struct AudioParams<'a> {
    voice_type: &'a str,
    encoding: &'a str,
    speed_ratio: f64,
}

#[derive(Debug, Serialize)]
struct TextParams<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    audio: AudioParams<'a>,
    request: TextParams<'a>,
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    data: Option<String>,
}

/// Client for `POST {endpoint}/v1/voice/tts`.
///
/// The provider answers with base64-encoded audio in `data`; the adapter
/// decodes and returns raw bytes in the requested container.
#[derive(Debug, Clone)]
pub struct SpeechModelClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SpeechModelClient {
    /// Creates a new speech synthesis client.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
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
        }
    }
}

#[async_trait]
impl SpeechSynthesis for SpeechModelClient {
    #[instrument(skip(self, text), fields(voice = voice_id, text_len = text.len()))]
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        speed_ratio: f64,
        encoding: &str,
    ) -> FabulaResult<Vec<u8>> {
        let request = SpeechRequest {
            audio: AudioParams {
                voice_type: voice_id,
                encoding,
                speed_ratio,
            },
            request: TextParams { text },
        };

        let url = format!("{}/v1/voice/tts", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("speech synthesis", e))?;
        let response = check_status("speech synthesis", response).await?;

        let parsed: SpeechResponse = response.json().await.map_err(|e| {
            ModelOutputError::new(ModelOutputErrorKind::InvalidJson(format!(
                "speech envelope: {e}"
            )))
        })?;

        let b64 = parsed.data.as_deref().filter(|d| !d.is_empty()).ok_or_else(|| {
            ModelOutputError::new(ModelOutputErrorKind::MissingKey("data".to_string()))
        })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| {
                ModelOutputError::new(ModelOutputErrorKind::Base64Decode(e.to_string()))
            })?;
        Ok(bytes)
    }
}
