//! Analysis Client: one upstream call per (candidate, job) pair.
//!
//! Pipeline: build prompt → generate (bounded by timeout) → strip fences →
//! parse JSON → backfill optional sections → attach metadata.
//!
//! Every failure is returned as an `AnalysisError` value carrying the
//! candidate and job ids, so batch callers can attribute it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::analysis::prompts::build_prompt;
use crate::llm_client::prompts::MISSING_FIELD;
use crate::llm_client::{
    strip_json_fences, LlmError, TextGenerator, GENERATION_CONFIG, UPSTREAM_TIMEOUT,
};
use crate::models::candidate::Candidate;
use crate::models::job::Job;

const EXPERIENCE_MATCH: &str = "experience_match";
const SALARY_EXPECTATION: &str = "salary_expectation";
/// How much of an unparsable reply is kept for diagnostics.
const RAW_EXCERPT_CHARS: usize = 200;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisErrorKind {
    /// Network failure, timeout, missing credential or non-2xx upstream status.
    TransportError,
    /// The upstream envelope did not contain the generated text.
    MalformedUpstreamResponse,
    /// The generated text did not parse as the expected JSON object.
    ResponsePayloadInvalid,
    /// The batch task running the analysis died before producing a result.
    TaskAborted,
}

impl AnalysisErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisErrorKind::TransportError => "TransportError",
            AnalysisErrorKind::MalformedUpstreamResponse => "MalformedUpstreamResponse",
            AnalysisErrorKind::ResponsePayloadInvalid => "ResponsePayloadInvalid",
            AnalysisErrorKind::TaskAborted => "TaskAborted",
        }
    }
}

impl std::fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {details}")]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub details: String,
    pub candidate_id: Value,
    pub job_id: Value,
}

impl AnalysisError {
    pub fn new(
        kind: AnalysisErrorKind,
        details: impl Into<String>,
        candidate: &Candidate,
        job: &Job,
    ) -> Self {
        Self {
            kind,
            details: details.into(),
            candidate_id: candidate.id.clone(),
            job_id: job.id.clone(),
        }
    }

    fn from_llm(err: LlmError, candidate: &Candidate, job: &Job) -> Self {
        let kind = if err.is_transport() {
            AnalysisErrorKind::TransportError
        } else {
            AnalysisErrorKind::MalformedUpstreamResponse
        };
        Self::new(kind, err.to_string(), candidate, job)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Result model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompatibilityLevel {
    High,
    Medium,
    Low,
}

impl CompatibilityLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            75..=u8::MAX => CompatibilityLevel::High,
            50..=74 => CompatibilityLevel::Medium,
            _ => CompatibilityLevel::Low,
        }
    }

    /// Case-insensitive label match. Also accepts the Portuguese labels the
    /// first version of the prompt asked for.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "high" | "alto" => Some(CompatibilityLevel::High),
            "medium" | "médio" | "medio" => Some(CompatibilityLevel::Medium),
            "low" | "baixo" => Some(CompatibilityLevel::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    pub candidate_id: Value,
    pub candidate_name: Option<String>,
    pub job_id: Value,
    pub job_title: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub model: String,
}

/// Flat analysis result returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub compatibility_score: u8,
    pub compatibility_level: CompatibilityLevel,
    pub summary: String,
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommendations: Vec<String>,
    pub next_steps: String,
    pub experience_match: Value,
    pub salary_expectation: Value,
    /// Keys the model returned beyond the documented schema.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub metadata: AnalysisMetadata,
}

/// Structured payload as returned by the model, after backfill.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisPayload {
    #[serde(deserialize_with = "deserialize_score")]
    pub compatibility_score: u8,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub compatibility_level: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub summary: String,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub matching_skills: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub missing_skills: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub areas_for_improvement: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_labels")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub next_steps: String,
    pub experience_match: Value,
    pub salary_expectation: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisPayload {
    fn into_result(self, metadata: AnalysisMetadata) -> AnalysisResult {
        let compatibility_level = CompatibilityLevel::from_label(&self.compatibility_level)
            .unwrap_or_else(|| CompatibilityLevel::from_score(self.compatibility_score));

        AnalysisResult {
            compatibility_score: self.compatibility_score,
            compatibility_level,
            summary: self.summary,
            matching_skills: self.matching_skills,
            missing_skills: self.missing_skills,
            strengths: self.strengths,
            areas_for_improvement: self.areas_for_improvement,
            recommendations: self.recommendations,
            next_steps: self.next_steps,
            experience_match: self.experience_match,
            salary_expectation: self.salary_expectation,
            extra: self.extra,
            metadata,
        }
    }
}

/// Accepts an integer, a float (rounded) or a numeric string such as "85%".
/// The value is clamped to 0–100.
fn deserialize_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let raw = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(v) if v.is_finite() => Ok(v.round().clamp(0.0, 100.0) as u8),
        _ => Err(de::Error::custom(format!(
            "compatibility_score is not a number: {value}"
        ))),
    }
}

/// Accepts a string, null, or a list of strings (joined with "; ").
fn deserialize_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; ")),
        other => Err(de::Error::custom(format!("expected text, got {other}"))),
    }
}

/// Accepts a list (non-string items are rendered as JSON), a single string, or null.
fn deserialize_labels<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Null => Ok(Vec::new()),
        other => Err(de::Error::custom(format!("expected a list, got {other}"))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pure parsing helpers
// ────────────────────────────────────────────────────────────────────────────

pub fn default_experience_match(candidate: &Candidate) -> Value {
    json!({
        "candidate_years": candidate.experience_years,
        "assessment": "Not assessed",
        "details": "Experience match was not provided by the analysis model"
    })
}

pub fn default_salary_expectation(job: &Job) -> Value {
    json!({
        "job_salary": job.salary.as_deref().unwrap_or(MISSING_FIELD),
        "alignment": "Not assessed",
        "details": "Salary expectation was not provided by the analysis model"
    })
}

/// Fills `experience_match` and `salary_expectation` when absent or null.
/// Present values are left untouched.
pub fn backfill_optional_sections(
    payload: &mut Map<String, Value>,
    candidate: &Candidate,
    job: &Job,
) {
    if payload.get(EXPERIENCE_MATCH).map_or(true, Value::is_null) {
        payload.insert(
            EXPERIENCE_MATCH.to_string(),
            default_experience_match(candidate),
        );
    }
    if payload.get(SALARY_EXPECTATION).map_or(true, Value::is_null) {
        payload.insert(SALARY_EXPECTATION.to_string(), default_salary_expectation(job));
    }
}

/// Strips fences, parses, backfills and validates the generated text.
/// Errors are human-readable details including an excerpt of the raw text.
pub fn parse_payload(raw: &str, candidate: &Candidate, job: &Job) -> Result<AnalysisPayload, String> {
    let text = strip_json_fences(raw);

    let value: Value = serde_json::from_str(text).map_err(|e| {
        format!(
            "generated text is not valid JSON ({e}); raw: {}",
            excerpt(text)
        )
    })?;

    let Value::Object(mut map) = value else {
        return Err(format!(
            "generated JSON is not an object; raw: {}",
            excerpt(text)
        ));
    };

    // Metadata is always ours.
    map.remove("metadata");
    backfill_optional_sections(&mut map, candidate, job);

    serde_json::from_value(Value::Object(map)).map_err(|e| {
        format!(
            "generated JSON does not match the analysis schema ({e}); raw: {}",
            excerpt(text)
        )
    })
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= RAW_EXCERPT_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(RAW_EXCERPT_CHARS).collect();
        format!("{head}…")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analyzer
// ────────────────────────────────────────────────────────────────────────────

/// Runs single-pair analyses. Cheap to clone; shared by the HTTP handlers and
/// every batch task.
#[derive(Clone)]
pub struct Analyzer {
    generator: Arc<dyn TextGenerator>,
    call_timeout: Duration,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            call_timeout: UPSTREAM_TIMEOUT,
        }
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Single attempt. A failure is terminal for this pair and is returned,
    /// never swallowed.
    pub async fn analyze(
        &self,
        candidate: &Candidate,
        job: &Job,
    ) -> Result<AnalysisResult, AnalysisError> {
        info!(
            candidate_id = %candidate.id,
            job_id = %job.id,
            "Analyzing: {} → {}",
            candidate.name.as_deref().unwrap_or(MISSING_FIELD),
            job.title.as_deref().unwrap_or(MISSING_FIELD)
        );

        let result = self.run(candidate, job).await;

        match &result {
            Ok(analysis) => info!(
                candidate_id = %candidate.id,
                job_id = %job.id,
                "Score: {}%",
                analysis.compatibility_score
            ),
            Err(e) => error!(
                candidate_id = %e.candidate_id,
                job_id = %e.job_id,
                kind = %e.kind,
                "Analysis failed: {}",
                e.details
            ),
        }

        result
    }

    async fn run(&self, candidate: &Candidate, job: &Job) -> Result<AnalysisResult, AnalysisError> {
        let prompt = build_prompt(candidate, job);
        let analyzed_at = Utc::now();

        let text = tokio::time::timeout(
            self.call_timeout,
            self.generator.generate(&prompt, &GENERATION_CONFIG),
        )
        .await
        .map_err(|_| {
            AnalysisError::new(
                AnalysisErrorKind::TransportError,
                format!(
                    "upstream call timed out after {}s",
                    self.call_timeout.as_secs_f32()
                ),
                candidate,
                job,
            )
        })?
        .map_err(|e| AnalysisError::from_llm(e, candidate, job))?;

        let payload = parse_payload(&text, candidate, job).map_err(|details| {
            AnalysisError::new(
                AnalysisErrorKind::ResponsePayloadInvalid,
                details,
                candidate,
                job,
            )
        })?;

        Ok(payload.into_result(AnalysisMetadata {
            candidate_id: candidate.id.clone(),
            candidate_name: candidate.name.clone(),
            job_id: job.id.clone(),
            job_title: job.title.clone(),
            analyzed_at,
            model: self.model().to_string(),
        }))
    }
}
