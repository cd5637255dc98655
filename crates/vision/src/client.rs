use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::gemini::GeminiClient;
use crate::openrouter::OpenRouterClient;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error(
        "Quota exceeded for model {model}. The app will try to use OCR fallback parsing. \
         Wait for the quota to reset or switch GEMINI_MODEL. Error: {detail}"
    )]
    QuotaExceeded { model: String, detail: String },
    #[error("Content was blocked: {0}")]
    Blocked(String),
    #[error("{0} did not return any text")]
    EmptyResponse(Provider),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Model response is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

/// Which hosted API serves the vision model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    OpenRouter,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Google => write!(f, "Gemini"),
            Provider::OpenRouter => write!(f, "OpenRouter"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(format!("Unsupported LLM provider: '{other}'")),
        }
    }
}

/// Everything needed to reach the configured provider.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub gemini_api_base: String,
    pub openrouter_api_base: String,
    pub timeout: Duration,
    /// Sent to OpenRouter as `X-Title`.
    pub app_title: String,
    /// Sent to OpenRouter as `HTTP-Referer`.
    pub app_url: Option<String>,
}

impl VisionConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: model.into(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            openrouter_api_base: DEFAULT_OPENROUTER_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
            app_title: "Gemini Receipt Analyzer".to_string(),
            app_url: None,
        }
    }
}

/// Model reply: the cleaned text and the JSON it decoded to.
#[derive(Debug, Clone)]
pub struct VisionOutput {
    pub raw_text: String,
    pub payload: Value,
}

impl VisionOutput {
    /// Strip markdown fences from a model reply and decode it as JSON.
    pub fn decode(text: &str) -> Result<Self, VisionError> {
        let raw_text = strip_code_fences(text).to_string();
        let payload = serde_json::from_str(&raw_text).map_err(VisionError::InvalidJson)?;
        Ok(Self { raw_text, payload })
    }
}

/// A hosted model that turns a receipt image into schema-shaped JSON.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn analyze(&self, image_bytes: &[u8], mime_type: &str) -> Result<VisionOutput, VisionError>;

    fn provider(&self) -> Provider;
}

/// Build the client for the configured provider.
pub fn connect(config: &VisionConfig) -> Result<Arc<dyn VisionClient>, VisionError> {
    let http = reqwest::Client::builder().timeout(config.timeout).build()?;
    let client: Arc<dyn VisionClient> = match config.provider {
        Provider::Google => Arc::new(GeminiClient::new(http, config)),
        Provider::OpenRouter => Arc::new(OpenRouterClient::new(http, config)),
    };
    tracing::info!(provider = %config.provider, model = %config.model, "Vision client ready");
    Ok(client)
}

/// Models often wrap JSON in a ```json fence despite being told not to.
pub fn strip_code_fences(text: &str) -> &str {
    let mut trimmed = text.trim();
    if trimmed.starts_with("```") {
        if let Some(newline) = trimmed.find('\n') {
            trimmed = &trimmed[newline + 1..];
        }
        trimmed = trimmed.trim_end_matches('`');
    }
    trimmed.trim()
}

/// Keep error details short enough to surface to a user.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Quota exhaustion shows up as a 429 or as a message that says so.
pub(crate) fn is_quota_error(status: u16, message: &str) -> bool {
    status == 429 || message.to_ascii_lowercase().contains("quota")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_fenced_json() {
        let text = "```json\n{\"total\": 8.22}\n```";
        assert_eq!(strip_code_fences(text), "{\"total\": 8.22}");
    }

    #[test]
    fn strip_leaves_plain_json_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn strip_bare_fence_without_language() {
        assert_eq!(strip_code_fences("```\n[]\n```"), "[]");
    }

    #[test]
    fn decode_keeps_cleaned_text() {
        let out = VisionOutput::decode("```json\n{\"merchant_name\": \"EAST REPAIR\"}\n```").unwrap();
        assert_eq!(out.raw_text, "{\"merchant_name\": \"EAST REPAIR\"}");
        assert_eq!(out.payload["merchant_name"], "EAST REPAIR");
    }

    #[test]
    fn decode_rejects_prose() {
        let err = VisionOutput::decode("Sorry, I cannot read this receipt.").unwrap_err();
        assert!(matches!(err, VisionError::InvalidJson(_)));
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("openrouter".parse::<Provider>().unwrap(), Provider::OpenRouter);
        assert!("azure".parse::<Provider>().is_err());
    }

    #[test]
    fn quota_detection() {
        assert!(is_quota_error(429, ""));
        assert!(is_quota_error(400, "Quota exceeded for metric"));
        assert!(!is_quota_error(500, "internal"));
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ab", 10), "ab");
    }
}
