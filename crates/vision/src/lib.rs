pub mod client;
pub mod gemini;
pub mod openrouter;
pub mod prompt;

pub use client::{connect, strip_code_fences, Provider, VisionClient, VisionConfig, VisionError, VisionOutput};
pub use gemini::GeminiClient;
pub use openrouter::OpenRouterClient;
pub use prompt::PROMPT;
