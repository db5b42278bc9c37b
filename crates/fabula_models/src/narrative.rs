//! Text-understanding adapter over an OpenAI-compatible chat endpoint.

use crate::http::{check_status, transport_error};
use async_trait::async_trait;
use fabula_error::{FabulaResult, ModelOutputError, ModelOutputErrorKind};
use fabula_interface::TextUnderstanding;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const SYSTEM_PROMPT: &str = "You are a professional literary analyst. \
Answer with a single JSON object and nothing else.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Client for structured prose analysis.
///
/// Speaks `POST {endpoint}/v1/chat/completions` with
/// `response_format: json_object` and hands the parsed object back to the
/// analyzer stage.
#[derive(Debug, Clone)]
pub struct NarrativeModelClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl NarrativeModelClient {
    /// Creates a new analysis client.
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
            temperature: 0.3,
        }
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl TextUnderstanding for NarrativeModelClient {
    #[instrument(skip(self, prompt, text), fields(model = %self.model, text_len = text.len()))]
    async fn analyze(&self, prompt: &str, text: &str) -> FabulaResult<serde_json::Value> {
        let content = format!("{prompt}\n\n{text}");
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &content,
                },
            ],
            response_format: ResponseFormat {
                format: "json_object",
            },
            temperature: self.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("chat completion", e))?;
        let response = check_status("chat completion", response).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            ModelOutputError::new(ModelOutputErrorKind::InvalidJson(format!(
                "chat completion envelope: {e}"
            )))
        })?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| {
                ModelOutputError::new(ModelOutputErrorKind::EmptyPayload(
                    "chat completion returned no choices".to_string(),
                ))
            })?;

        debug!(content_len = content.len(), "received analysis payload");

        let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
            ModelOutputError::new(ModelOutputErrorKind::InvalidJson(e.to_string()))
        })?;
        if !value.is_object() {
            return Err(ModelOutputError::new(ModelOutputErrorKind::MalformedField {
                field: "$".to_string(),
                detail: "analysis payload is not a JSON object".to_string(),
            })
            .into());
        }
        Ok(value)
    }
}
