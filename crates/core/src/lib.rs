pub mod receipt;

pub use receipt::{AnalyzeResponse, CoerceError, LineItem, ReceiptRecord, DEFAULT_CURRENCY};
