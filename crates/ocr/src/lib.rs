pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;

pub use extract::{Extractor, MAX_LINE_ITEMS, PAYMENT_KEYWORDS};
pub use hash::fingerprint;
pub use pipeline::{OcrOutput, OcrPipeline, PipelineError};
pub use preprocess::{prepare_for_ocr, PreprocessError};
pub use recognizer::{default_backend, MockRecognizer, OcrBackend, OcrError};
