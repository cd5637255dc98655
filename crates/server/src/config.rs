use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tillscan_vision::{Provider, VisionConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid { key: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Service configuration, built once at startup and handed to whoever needs it.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub llm_provider: Provider,
    pub enable_ocr_fallback: bool,
    pub allowed_origins: Vec<String>,
    pub gemini_api_base: String,
    pub openrouter_api_base: String,
    pub request_timeout: Duration,
    pub client_app_title: String,
    pub client_app_url: Option<String>,
    pub samples_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub tesseract_data_path: Option<String>,
    /// Serve this text from a mock OCR engine instead of a real one.
    pub ocr_mock_text: Option<String>,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and blank are the same thing.
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let llm_provider = match get("LLM_PROVIDER") {
            Some(v) => v.parse::<Provider>().map_err(|reason| invalid("LLM_PROVIDER", &v, reason))?,
            None => Provider::Google,
        };

        let enable_ocr_fallback = match get("ENABLE_OCR_FALLBACK") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                invalid("ENABLE_OCR_FALLBACK", &v, "expected true/false".into())
            })?,
            None => true,
        };

        let timeout_secs: u64 = parse_or("REQUEST_TIMEOUT_SECONDS", get("REQUEST_TIMEOUT_SECONDS"), 60)?;
        let max_upload_bytes: usize = parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), 10 * 1024 * 1024)?;
        let bind_addr: SocketAddr = parse_or(
            "BIND_ADDR",
            get("BIND_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], 8000)),
        )?;

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("compact") | Some("pretty") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid("LOG_FORMAT", other, "expected compact or json".into())),
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: or("GEMINI_MODEL", "gemini-2.0-flash"),
            llm_provider,
            enable_ocr_fallback,
            allowed_origins: split_origins(&or("ALLOWED_ORIGINS_RAW", "http://localhost:5173")),
            gemini_api_base: or("GEMINI_API_BASE", tillscan_vision::client::DEFAULT_GEMINI_API_BASE),
            openrouter_api_base: or("OPENROUTER_API_BASE", tillscan_vision::client::DEFAULT_OPENROUTER_API_BASE),
            request_timeout: Duration::from_secs(timeout_secs),
            client_app_title: or("CLIENT_APP_TITLE", "Gemini Receipt Analyzer"),
            client_app_url: Some(or("CLIENT_APP_URL", "http://localhost:5173")),
            samples_dir: PathBuf::from(or("SAMPLES_DIR", "samples")),
            bind_addr,
            max_upload_bytes,
            tesseract_data_path: get("TESSERACT_DATA_PATH"),
            ocr_mock_text: lookup("OCR_MOCK_TEXT").filter(|v| !v.is_empty()),
            log_format,
        })
    }

    /// Vision client settings, or `None` when no API key is configured.
    pub fn vision_config(&self) -> Option<VisionConfig> {
        let api_key = self.gemini_api_key.clone()?;
        Some(VisionConfig {
            provider: self.llm_provider,
            api_key,
            model: self.gemini_model.clone(),
            gemini_api_base: self.gemini_api_base.clone(),
            openrouter_api_base: self.openrouter_api_base.clone(),
            timeout: self.request_timeout,
            app_title: self.client_app_title.clone(),
            app_url: self.client_app_url.clone(),
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::Invalid { key, value: value.to_string(), reason }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.parse().map_err(|e: T::Err| invalid(key, &v, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}
