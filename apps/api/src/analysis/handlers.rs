//! Axum route handlers for the Analysis API.
//!
//! Handlers read the raw body so every rejection, including a missing or
//! non-JSON body, is rendered through `AppError` as a JSON envelope. Only
//! structural checks live here; field-level tolerance belongs to the models.

use axum::{body::Bytes, extract::State, Json};
use serde_json::{Map, Value};

use crate::analysis::analyzer::AnalysisResult;
use crate::analysis::batch::{BatchReport, MAX_BATCH_CANDIDATES};
use crate::errors::AppError;
use crate::models::candidate::Candidate;
use crate::models::job::Job;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request parsing
// ────────────────────────────────────────────────────────────────────────────

fn parse_body(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Validation("Request body is required".to_string()));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Validation(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(AppError::Validation(format!(
            "Request body is not valid JSON: {e}"
        ))),
    }
}

fn require_object<'a>(
    body: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Map<String, Value>, AppError> {
    body.get(field)
        .ok_or_else(|| AppError::Validation(format!("Field \"{field}\" is required")))?
        .as_object()
        .ok_or_else(|| AppError::Validation(format!("Field \"{field}\" must be a JSON object")))
}

/// `{candidate: object, job: object}`
pub fn parse_analyze_request(body: &[u8]) -> Result<(Candidate, Job), AppError> {
    let body = parse_body(body)?;

    if !body.contains_key("candidate") || !body.contains_key("job") {
        return Err(AppError::Validation(
            "Fields \"candidate\" and \"job\" are required".to_string(),
        ));
    }

    let candidate = Candidate::from_json(require_object(&body, "candidate")?);
    let job = Job::from_json(require_object(&body, "job")?);
    Ok((candidate, job))
}

/// `{job: object, candidates: [object; 1..=50]}`
pub fn parse_batch_request(body: &[u8]) -> Result<(Job, Vec<Candidate>), AppError> {
    let body = parse_body(body)?;

    if !body.contains_key("job") || !body.contains_key("candidates") {
        return Err(AppError::Validation(
            "Fields \"job\" and \"candidates\" are required".to_string(),
        ));
    }

    let job = Job::from_json(require_object(&body, "job")?);

    let items = body
        .get("candidates")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Validation("Field \"candidates\" must be an array".to_string()))?;

    if items.is_empty() {
        return Err(AppError::Validation(
            "Field \"candidates\" must contain at least one candidate".to_string(),
        ));
    }
    if items.len() > MAX_BATCH_CANDIDATES {
        return Err(AppError::Validation(format!(
            "Field \"candidates\" accepts at most {MAX_BATCH_CANDIDATES} candidates (got {})",
            items.len()
        )));
    }

    let candidates = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object().map(Candidate::from_json).ok_or_else(|| {
                AppError::Validation(format!("candidates[{i}] must be a JSON object"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((job, candidates))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/analyze-compatibility
///
/// Runs one analysis and returns the flat result. Any analysis failure is a 500.
pub async fn handle_analyze_compatibility(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalysisResult>, AppError> {
    let (candidate, job) = parse_analyze_request(&body)?;
    let result = state.analyzer.analyze(&candidate, &job).await?;
    Ok(Json(result))
}

/// POST /api/batch-analyze
///
/// Fans the job out over every candidate. Returns 200 once dispatched;
/// per-candidate failures are reported inside `errors`.
pub async fn handle_batch_analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchReport>, AppError> {
    let (job, candidates) = parse_batch_request(&body)?;
    let report = state
        .pool
        .batch_analyze(&state.analyzer, job, candidates)
        .await;
    Ok(Json(report))
}
