pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod openrouter;
