/// Cerebras (OpenAI-compatible chat completions) integration.
pub mod cerebras;
