use std::sync::Arc;

use tillscan_core::{AnalyzeResponse, ReceiptRecord};
use tillscan_ocr::{fingerprint, OcrBackend, OcrPipeline};
use tillscan_vision::VisionClient;
use tracing::{field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

const VISION_WARNING_CHARS: usize = 200;
const PARSE_WARNING_CHARS: usize = 100;

pub type SharedPipeline = Arc<OcrPipeline<Box<dyn OcrBackend>>>;

/// Vision model first, local OCR as the safety net.
pub struct Analyzer {
    vision: Option<Arc<dyn VisionClient>>,
    ocr: Option<SharedPipeline>,
    enable_ocr_fallback: bool,
}

impl Analyzer {
    pub fn new(
        vision: Option<Arc<dyn VisionClient>>,
        ocr: Option<Box<dyn OcrBackend>>,
        enable_ocr_fallback: bool,
    ) -> Self {
        Self {
            vision,
            ocr: ocr.map(|backend| Arc::new(OcrPipeline::new(backend))),
            enable_ocr_fallback,
        }
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr.is_some()
    }

    /// Analyse one upload. Every failure ends up in `warnings`; the caller
    /// always gets a response.
    pub async fn process(&self, data: &[u8], mime_type: &str) -> AnalyzeResponse {
        let span = info_span!(
            "analyze",
            request_id = %Uuid::new_v4(),
            fingerprint = %fingerprint(data),
            size = data.len(),
            mime = %mime_type,
            provider = field::Empty,
        );
        self.run(data, mime_type).instrument(span).await
    }

    async fn run(&self, data: &[u8], mime_type: &str) -> AnalyzeResponse {
        let mut warnings = Vec::new();
        let mut raw_text = None;
        let mut parsed = None;

        match self.ask_vision(data, mime_type, &mut raw_text).await {
            Ok(record) => parsed = Some(record),
            Err(message) => {
                warn!(%message, "Vision analysis failed");
                warnings.push(format!(
                    "Gemini analysis failed: {}",
                    truncate(&message, VISION_WARNING_CHARS)
                ));
            }
        }
        let vision_failed = parsed.is_none();

        let mut ocr_text = None;
        if self.enable_ocr_fallback {
            match &self.ocr {
                Some(pipeline) => {
                    ocr_text = read_text(pipeline, data).await;
                    if let Some(text) = ocr_text.as_deref().filter(|t| vision_failed && !t.is_empty()) {
                        match parse_text(pipeline, text).await {
                            Ok(record) => {
                                if record.has_headline() {
                                    warnings.push(
                                        "Using OCR-based parsing as Gemini quota was exceeded.".to_string(),
                                    );
                                }
                                parsed = Some(record);
                            }
                            Err(message) => warnings.push(format!(
                                "OCR parsing failed: {}",
                                truncate(&message, PARSE_WARNING_CHARS)
                            )),
                        }
                    }
                }
                None => warnings.push("OCR fallback requested but no OCR engine is available.".to_string()),
            }
        }

        info!(
            parsed = parsed.is_some(),
            ocr = ocr_text.is_some(),
            warnings = warnings.len(),
            "Analysis finished"
        );

        AnalyzeResponse { parsed, raw_text, ocr_text, warnings }
    }

    /// Ask the vision model for a record. `raw_text` is filled as soon as the
    /// reply decodes, even if it then fails to fit the schema.
    async fn ask_vision(
        &self,
        data: &[u8],
        mime_type: &str,
        raw_text: &mut Option<String>,
    ) -> Result<ReceiptRecord, String> {
        let client = self
            .vision
            .as_ref()
            .ok_or_else(|| "GEMINI_API_KEY is not configured".to_string())?;
        Span::current().record("provider", field::display(client.provider()));
        let output = client.analyze(data, mime_type).await.map_err(|e| e.to_string())?;
        info!(chars = output.raw_text.len(), "Vision model answered");
        *raw_text = Some(output.raw_text);
        ReceiptRecord::from_payload(output.payload).map_err(|e| e.to_string())
    }
}

/// OCR runs on a blocking thread; failures are logged and yield no text.
async fn read_text(pipeline: &SharedPipeline, data: &[u8]) -> Option<String> {
    let pipeline = Arc::clone(pipeline);
    let data = data.to_vec();
    match tokio::task::spawn_blocking(move || pipeline.read_text(&data)).await {
        Ok(Ok(out)) => Some(out.text),
        Ok(Err(e)) => {
            warn!(error = %e, "OCR failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "OCR task aborted");
            None
        }
    }
}

/// The parser does not fail on bad text, but a panic must not take the
/// request down with it.
async fn parse_text(pipeline: &SharedPipeline, text: &str) -> Result<ReceiptRecord, String> {
    let pipeline = Arc::clone(pipeline);
    let text = text.to_string();
    tokio::task::spawn_blocking(move || pipeline.parse(&text))
        .await
        .map_err(|e| e.to_string())
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
