use std::path::PathBuf;
use std::sync::Arc;

use tillscan_ocr::{default_backend, MockRecognizer, OcrBackend};
use tillscan_vision::{connect, VisionError};
use tracing::{info, warn};

use crate::analyzer::Analyzer;
use crate::config::Settings;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub samples_dir: PathBuf,
}

impl AppState {
    pub fn new(analyzer: Analyzer, samples_dir: impl Into<PathBuf>) -> Self {
        Self { analyzer: Arc::new(analyzer), samples_dir: samples_dir.into() }
    }

    /// Wire up the vision client and OCR engine the settings ask for.
    pub fn from_settings(settings: &Settings) -> Result<Self, VisionError> {
        let vision = match settings.vision_config() {
            Some(config) => Some(connect(&config)?),
            None => {
                warn!("GEMINI_API_KEY is not set; every request will rely on OCR fallback");
                None
            }
        };

        let ocr = ocr_engine(settings);
        match &ocr {
            Some(engine) => info!(engine = engine.name(), "OCR engine ready"),
            None if settings.enable_ocr_fallback => warn!("No OCR engine available; fallback is disabled in practice"),
            None => {}
        }

        let analyzer = Analyzer::new(vision, ocr, settings.enable_ocr_fallback);
        Ok(Self::new(analyzer, settings.samples_dir.clone()))
    }
}

fn ocr_engine(settings: &Settings) -> Option<Box<dyn OcrBackend>> {
    if let Some(text) = &settings.ocr_mock_text {
        return Some(Box::new(MockRecognizer::new(text.clone())));
    }
    default_backend(settings.tesseract_data_path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    #[test]
    fn mock_text_selects_mock_engine() {
        let s = settings(&[("OCR_MOCK_TEXT", "SHOP\nTOTAL 1.00")]);
        let engine = ocr_engine(&s).unwrap();
        assert_eq!(engine.name(), "mock");
    }

    #[test]
    fn state_builds_with_key_and_samples_dir() {
        let s = settings(&[
            ("GEMINI_API_KEY", "k"),
            ("OCR_MOCK_TEXT", "SHOP"),
            ("SAMPLES_DIR", "/tmp/tillscan-samples"),
        ]);
        let state = AppState::from_settings(&s).unwrap();
        assert!(state.analyzer.ocr_available());
        assert_eq!(state.samples_dir, PathBuf::from("/tmp/tillscan-samples"));
    }
}
