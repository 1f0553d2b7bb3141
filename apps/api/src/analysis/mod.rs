// Compatibility analysis: prompt building, single-pair analysis against the
// LLM, and the concurrent batch runner.
// All LLM calls go through llm_client; nothing here talks to Gemini directly.

pub mod analyzer;
pub mod batch;
pub mod handlers;
pub mod prompts;
