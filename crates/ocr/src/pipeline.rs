use thiserror::Error;
use tillscan_core::ReceiptRecord;

use crate::extract::Extractor;
use crate::hash;
use crate::preprocess;
use crate::recognizer::{OcrBackend, OcrError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocess::PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

/// Text recognized from one upload.
#[derive(Debug, Clone)]
pub struct OcrOutput {
    /// SHA-256 hex digest of the upload.
    pub fingerprint: String,
    pub text: String,
}

/// Orchestrates: fingerprint → preprocess → OCR, and the text → record parse.
///
/// Everything here is blocking; async callers should hop onto a blocking thread.
pub struct OcrPipeline<R: OcrBackend> {
    recognizer: R,
}

impl<R: OcrBackend> OcrPipeline<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer }
    }

    pub fn engine(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Recognize the text of an uploaded image.
    pub fn read_text(&self, data: &[u8]) -> Result<OcrOutput, PipelineError> {
        let fingerprint = hash::fingerprint(data);
        let image_bytes = preprocess::prepare_for_ocr(data)?;
        let text = self.recognizer.recognize(&image_bytes)?;

        tracing::info!(
            engine = self.engine(),
            %fingerprint,
            chars = text.len(),
            "OCR complete"
        );

        Ok(OcrOutput { fingerprint, text })
    }

    /// Rebuild a receipt from recognized text with the heuristic parser.
    pub fn parse(&self, text: &str) -> ReceiptRecord {
        Extractor::extract(text)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
