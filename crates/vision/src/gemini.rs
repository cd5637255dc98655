use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use crate::client::{is_quota_error, truncate, Provider, VisionClient, VisionConfig, VisionError, VisionOutput};
use crate::prompt::PROMPT;

/// Google Generative Language API, `generateContent` with an inline image.
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, config: &VisionConfig) -> Self {
        Self {
            http,
            api_base: config.gemini_api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn request_body(image_bytes: &[u8], mime_type: &str) -> Value {
        json!({
            "contents": [{
                "parts": [
                    { "text": PROMPT },
                    {
                        "inline_data": {
                            "mime_type": mime_type,
                            "data": STANDARD.encode(image_bytes)
                        }
                    }
                ]
            }],
            "safetySettings": [
                { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" },
                { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" }
            ]
        })
    }

    async fn generate(&self, image_bytes: &[u8], mime_type: &str) -> Result<String, VisionError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(image_bytes, mime_type))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown Gemini API error")
                .to_string();
            if is_quota_error(status.as_u16(), &message) {
                return Err(VisionError::QuotaExceeded {
                    model: self.model.clone(),
                    detail: truncate(&message, 150),
                });
            }
            return Err(VisionError::Api { status: status.as_u16(), message });
        }

        let body: Value = response.json().await?;
        response_text(&body)
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(body: &Value) -> Result<String, VisionError> {
    let text: String = body["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(VisionError::Blocked(reason.to_string()));
    }
    Err(VisionError::EmptyResponse(Provider::Google))
}

#[async_trait]
impl VisionClient for GeminiClient {
    async fn analyze(&self, image_bytes: &[u8], mime_type: &str) -> Result<VisionOutput, VisionError> {
        let text = self.generate(image_bytes, mime_type).await?;
        tracing::debug!(model = %self.model, chars = text.len(), "Gemini replied");
        VisionOutput::decode(&text)
    }

    fn provider(&self) -> Provider {
        Provider::Google
    }
}
