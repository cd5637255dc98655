//! HTTP front end: receipt uploads go to the vision model, with local OCR
//! and a heuristic parser behind it.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use analyzer::Analyzer;
pub use config::Settings;
pub use error::ApiError;
pub use state::AppState;
