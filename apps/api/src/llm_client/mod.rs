//! LLM Client: the single point of entry for all Gemini API calls in WorkTree.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! Callers depend on the `TextGenerator` trait so the upstream can be swapped
//! for a deterministic stub in tests.
//!
//! Model: gemini-2.0-flash (hardcoded, along with the generation config)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

/// The model used for all analysis calls.
pub const MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1/models/gemini-2.0-flash:generateContent";
/// Upper bound for a single upstream call.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Sampling parameters sent with every upstream call. Not request-configurable.
pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.7,
    top_p: 0.95,
    top_k: 40,
    max_output_tokens: 2048,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("GOOGLE_API_KEY is not configured")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),
}

impl LlmError {
    /// True for failures that happened before a well-formed envelope arrived.
    pub fn is_transport(&self) -> bool {
        !matches!(self, LlmError::MalformedEnvelope(_))
    }
}

/// Narrow capability used by the analysis layer: prompt in, generated text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier reported in analysis metadata.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseCandidate {
    pub content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, trimmed.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .map(str::trim)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// Parses a raw upstream body and pulls out the generated text span.
pub fn extract_text(body: &str) -> Result<String, LlmError> {
    let envelope: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::MalformedEnvelope(format!("response is not a valid envelope: {e}")))?;

    envelope.text().map(str::to_string).ok_or_else(|| {
        LlmError::MalformedEnvelope(
            "missing candidates[0].content.parts[0].text in response".to_string(),
        )
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini implementation
// ────────────────────────────────────────────────────────────────────────────

/// Gemini `generateContent` client. Cheap to clone; the inner reqwest client
/// pools connections and is safe to share across tasks.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(UPSTREAM_TIMEOUT).build()?,
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn model(&self) -> &str {
        MODEL
    }

    /// Single attempt, no retries: a failed call is terminal for the caller.
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let request_body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: config,
        };

        debug!(model = MODEL, prompt_len = prompt.len(), "Sending request to Gemini API");

        let response = self
            .client
            .post(GEMINI_API_URL)
            .query(&[("key", api_key)])
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Gemini API returned {}", status);
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        extract_text(&body)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
/// Each marker is handled independently, so a payload with only an opening
/// or only a closing fence is also cleaned.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text)
        .trim_start();
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_leading_only() {
        let input = "```json\n{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_trailing_only() {
        let input = "  {\"key\": \"value\"}\n```  ";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_is_idempotent() {
        let once = strip_json_fences("```json\n{\"a\": 1}\n```");
        assert_eq!(strip_json_fences(once), once);
    }

    #[test]
    fn test_extract_text_from_envelope() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "  {\"compatibility_score\": 80}\n"}], "role": "model"},
                 "finishReason": "STOP"}
            ],
            "usageMetadata": {"promptTokenCount": 10}
        }"#;
        assert_eq!(extract_text(body).unwrap(), "{\"compatibility_score\": 80}");
    }

    #[test]
    fn test_extract_text_missing_candidates_is_malformed() {
        let err = extract_text(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, LlmError::MalformedEnvelope(_)));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_extract_text_missing_parts_is_malformed() {
        let body = r#"{"candidates": [{"content": {"parts": []}}]}"#;
        assert!(matches!(
            extract_text(body),
            Err(LlmError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_extract_text_non_json_body_is_malformed() {
        assert!(matches!(
            extract_text("<html>bad gateway</html>"),
            Err(LlmError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_generation_config_serializes_camel_case() {
        let value = serde_json::to_value(GENERATION_CONFIG).unwrap();
        assert_eq!(value["topK"], 40);
        assert_eq!(value["maxOutputTokens"], 2048);
        assert!(value.get("topP").is_some());
        assert!(value.get("temperature").is_some());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let client = GeminiClient::new(None).unwrap();
        let err = client
            .generate("prompt", &GENERATION_CONFIG)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
        assert!(err.is_transport());
    }
}
