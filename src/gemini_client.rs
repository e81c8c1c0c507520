use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::completion::{Attachment, CompletionService, CONFIGURATION_ERROR_MESSAGE};
use crate::config::ClientConfig;
use crate::error::CompletionError;

/// Client for Gemini's `generateContent` endpoint.
///
/// One query per call: no history is sent, nothing is streamed and
/// failed calls are not retried.
pub struct GeminiClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: ClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self { config, client }
    }

    fn request_url(&self, api_key: &str) -> Result<Url, CompletionError> {
        let base = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.as_str().trim_end_matches('/'),
            self.config.model
        );
        Ok(Url::parse_with_params(&base, &[("key", api_key)])?)
    }

    fn request_body(&self, query: &str, attachment: Option<&Attachment>) -> Value {
        let mut parts = vec![json!({ "text": query })];

        match attachment {
            Some(attachment) if self.config.multimodal => {
                parts.push(json!({
                    "inlineData": {
                        "mimeType": attachment.mime_type,
                        "data": BASE64.encode(&attachment.data)
                    }
                }));
            }
            Some(_) => debug!("Multimodal input disabled, dropping attachment"),
            None => {}
        }

        json!({
            "systemInstruction": {
                "parts": [
                    {
                        "text": self.config.persona.system_instruction()
                    }
                ]
            },
            "contents": [
                {
                    "role": "user",
                    "parts": parts
                }
            ],
            "generationConfig": {
                "temperature": 0.7,
                "topP": 0.95,
                "topK": 40,
                "maxOutputTokens": 2048
            }
        })
    }

    /// Perform the API call, surfacing every failure.
    pub async fn generate_content(
        &self,
        query: &str,
        attachment: Option<&Attachment>,
    ) -> Result<String, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)?;

        let url = self.request_url(api_key)?;
        let request_body = self.request_body(query, attachment);

        // The URL carries the key, so only the model and body are logged.
        debug!(
            "Sending request to Gemini model {}: {}",
            self.config.model,
            redact_inline_data(&request_body)
        );

        // reqwest errors print the request URL, which carries the key.
        let response = self
            .client
            .post(url)
            .json(&request_body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("API request failed with status {}: {}", status, body);
            return Err(CompletionError::Status { status, body });
        }

        let response_json: Value = response.json().await.map_err(reqwest::Error::without_url)?;
        debug!("Received response from Gemini API: {}", response_json);

        extract_text(&response_json).ok_or(CompletionError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, query: &str, attachment: Option<&Attachment>) -> String {
        match self.generate_content(query, attachment).await {
            Ok(text) => text,
            Err(CompletionError::MissingCredential) => {
                info!("No API key configured, replying with configuration notice");
                CONFIGURATION_ERROR_MESSAGE.to_string()
            }
            Err(e) => {
                error!("Gemini request failed: {}", e);
                self.config.persona.fallback_message().to_string()
            }
        }
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        if let Some(reason) = response["candidates"][0].get("finishReason") {
            info!("Candidate finished without text: {}", reason);
        }
        None
    } else {
        Some(text)
    }
}

fn redact_inline_data(body: &Value) -> String {
    let mut body = body.clone();
    if let Some(parts) = body["contents"][0]["parts"].as_array_mut() {
        for part in parts {
            if let Some(data) = part.get_mut("inlineData").and_then(|d| d.get_mut("data")) {
                let len = data.as_str().map(str::len).unwrap_or(0);
                *data = Value::String(format!("<{} base64 chars>", len));
            }
        }
    }
    body.to_string()
}
