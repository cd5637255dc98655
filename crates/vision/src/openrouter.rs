use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use crate::client::{is_quota_error, truncate, Provider, VisionClient, VisionConfig, VisionError, VisionOutput};
use crate::prompt::{PROMPT, USER_MESSAGE};

/// OpenAI-compatible chat completions through OpenRouter.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    app_title: String,
    app_url: String,
}

impl OpenRouterClient {
    pub fn new(http: reqwest::Client, config: &VisionConfig) -> Self {
        Self {
            http,
            api_base: config.openrouter_api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            app_title: config.app_title.clone(),
            app_url: config
                .app_url
                .clone()
                .unwrap_or_else(|| "http://localhost".to_string()),
        }
    }

    fn request_body(&self, image_bytes: &[u8], mime_type: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": [{ "type": "text", "text": PROMPT }] },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_MESSAGE },
                        { "type": "image_url", "image_url": { "url": data_url(image_bytes, mime_type) } }
                    ]
                }
            ]
        })
    }

    async fn complete(&self, image_bytes: &[u8], mime_type: &str) -> Result<String, VisionError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.app_url)
            .header("X-Title", &self.app_title)
            .json(&self.request_body(image_bytes, mime_type))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if is_quota_error(status.as_u16(), &message) {
                return Err(VisionError::QuotaExceeded {
                    model: self.model.clone(),
                    detail: truncate(&message, 150),
                });
            }
            return Err(VisionError::Api { status: status.as_u16(), message: truncate(&message, 200) });
        }

        let body: Value = response.json().await?;
        message_text(&body)
    }
}

fn data_url(image_bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(image_bytes))
}

/// Message content is either a plain string or a list of typed parts.
fn message_text(body: &Value) -> Result<String, VisionError> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .ok_or_else(|| VisionError::MalformedResponse("missing message content".into()))?;

    let segments: Vec<&str> = match content {
        Value::String(s) => vec![s.as_str()],
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                Value::Object(o) if o.get("type").and_then(Value::as_str) == Some("text") => {
                    Some(o.get("text").and_then(Value::as_str).unwrap_or(""))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let text = segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        return Err(VisionError::EmptyResponse(Provider::OpenRouter));
    }
    Ok(text)
}

#[async_trait]
impl VisionClient for OpenRouterClient {
    async fn analyze(&self, image_bytes: &[u8], mime_type: &str) -> Result<VisionOutput, VisionError> {
        let text = self.complete(image_bytes, mime_type).await?;
        tracing::debug!(model = %self.model, chars = text.len(), "OpenRouter replied");
        VisionOutput::decode(&text)
    }

    fn provider(&self) -> Provider {
        Provider::OpenRouter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::connect;
    use httpmock::prelude::*;

    fn config(base: String) -> VisionConfig {
        let mut config = VisionConfig::new(Provider::OpenRouter, "or-key", "google/gemini-2.0-flash");
        config.openrouter_api_base = format!("{base}/");
        config.app_url = Some("http://localhost:5173".into());
        config
    }

    #[tokio::test]
    async fn analyze_sends_headers_and_decodes_parts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("Authorization", "Bearer or-key")
                    .header("HTTP-Referer", "http://localhost:5173")
                    .header("X-Title", "Gemini Receipt Analyzer")
                    .body_contains("data:image/png;base64,");
                then.status(200).json_body(json!({
                    "choices": [{
                        "message": {
                            "content": [
                                { "type": "text", "text": "  {\"total\": 290.99}  " }
                            ]
                        }
                    }]
                }));
            })
            .await;

        let client = connect(&config(server.base_url())).unwrap();
        let out = client.analyze(b"png", "image/png").await.unwrap();

        mock.assert_async().await;
        assert_eq!(out.raw_text, "{\"total\": 290.99}");
        assert_eq!(client.provider(), Provider::OpenRouter);
    }

    #[tokio::test]
    async fn http_failure_is_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401).body("No auth credentials found");
            })
            .await;

        let client = connect(&config(server.base_url())).unwrap();
        let err = client.analyze(b"png", "image/png").await.unwrap_err();
        assert!(matches!(err, VisionError::Api { status: 401, .. }));
    }

    #[test]
    fn string_content_is_accepted() {
        let body = json!({ "choices": [{ "message": { "content": "{}" } }] });
        assert_eq!(message_text(&body).unwrap(), "{}");
    }

    #[test]
    fn mixed_parts_are_joined_by_newline() {
        let body = json!({ "choices": [{ "message": { "content": [
            "{\"a\":",
            { "type": "image_url", "image_url": { "url": "ignored" } },
            { "type": "text", "text": " 1}" }
        ] } }] });
        assert_eq!(message_text(&body).unwrap(), "{\"a\":\n1}");
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = message_text(&json!({ "error": "nope" })).unwrap_err();
        assert!(matches!(err, VisionError::MalformedResponse(_)));
    }

    #[test]
    fn blank_content_is_empty_response() {
        let body = json!({ "choices": [{ "message": { "content": "   " } }] });
        let err = message_text(&body).unwrap_err();
        assert_eq!(err.to_string(), "OpenRouter did not return any text");
    }

    #[test]
    fn data_url_is_base64() {
        assert_eq!(data_url(b"abc", "image/jpeg"), "data:image/jpeg;base64,YWJj");
    }
}
