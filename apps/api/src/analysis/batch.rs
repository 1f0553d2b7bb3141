//! Concurrent Batch Runner: fans one job out over many candidates.
//!
//! Each candidate gets its own tokio task; a semaphore owned by `WorkerPool`
//! caps how many upstream calls are in flight at once. Tasks share nothing
//! mutable: each returns an independent outcome, and one failure never stops
//! the others.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::analysis::analyzer::{AnalysisError, AnalysisErrorKind, AnalysisResult, Analyzer};
use crate::models::candidate::Candidate;
use crate::models::job::Job;

/// Hard upper bound on candidates per batch request.
pub const MAX_BATCH_CANDIDATES: usize = 50;

/// A per-candidate failure inside a batch report.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub error: AnalysisErrorKind,
    pub details: String,
    pub candidate_id: Value,
    pub job_id: Value,
}

impl From<AnalysisError> for FailureRecord {
    fn from(err: AnalysisError) -> Self {
        Self {
            error: err.kind,
            details: err.details,
            candidate_id: err.candidate_id,
            job_id: err.job_id,
        }
    }
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Success(Box<AnalysisResult>),
    Failure(FailureRecord),
}

impl From<Result<AnalysisResult, AnalysisError>> for BatchOutcome {
    fn from(result: Result<AnalysisResult, AnalysisError>) -> Self {
        match result {
            Ok(analysis) => BatchOutcome::Success(Box::new(analysis)),
            Err(err) => BatchOutcome::Failure(err.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub job_id: Value,
    pub job_title: Option<String>,
    pub total_candidates: usize,
    pub successful_analyses: usize,
    pub failed_analyses: usize,
    pub analyzed_at: DateTime<Utc>,
    /// Sorted by `compatibility_score`, highest first.
    pub results: Vec<AnalysisResult>,
    /// `null` when every candidate succeeded.
    pub errors: Option<Vec<FailureRecord>>,
}

/// Partitions outcomes and ranks successes by score, descending. Tie order is
/// unspecified.
pub fn build_report(job: &Job, outcomes: Vec<BatchOutcome>) -> BatchReport {
    let total_candidates = outcomes.len();
    let mut results = Vec::new();
    let mut errors = Vec::new();

    for outcome in outcomes {
        match outcome {
            BatchOutcome::Success(analysis) => results.push(*analysis),
            BatchOutcome::Failure(failure) => errors.push(failure),
        }
    }

    results.sort_unstable_by(|a, b| b.compatibility_score.cmp(&a.compatibility_score));

    BatchReport {
        job_id: job.id.clone(),
        job_title: job.title.clone(),
        total_candidates,
        successful_analyses: results.len(),
        failed_analyses: errors.len(),
        analyzed_at: Utc::now(),
        results,
        errors: (!errors.is_empty()).then_some(errors),
    }
}

/// Bounded pool for batch analyses. Built once at startup and cloned into
/// `AppState`; clones share the same permits.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs one analysis per candidate and waits for all of them. The caller
    /// is responsible for the 1..=50 bound on `candidates`.
    pub async fn batch_analyze(
        &self,
        analyzer: &Analyzer,
        job: Job,
        candidates: Vec<Candidate>,
    ) -> BatchReport {
        let job = Arc::new(job);
        info!(
            job_id = %job.id,
            candidates = candidates.len(),
            workers = self.size,
            "Starting batch analysis"
        );

        let mut handles = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let permits = Arc::clone(&self.permits);
            let analyzer = analyzer.clone();
            let job = Arc::clone(&job);
            let candidate_id = candidate.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Err(AnalysisError::new(
                            AnalysisErrorKind::TaskAborted,
                            "worker pool is closed",
                            &candidate,
                            &job,
                        ))
                    }
                };
                analyzer.analyze(&candidate, &job).await
            });
            handles.push((candidate_id, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (candidate_id, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => BatchOutcome::from(result),
                Err(e) => {
                    warn!(candidate_id = %candidate_id, "Batch task aborted: {e}");
                    BatchOutcome::Failure(FailureRecord {
                        error: AnalysisErrorKind::TaskAborted,
                        details: e.to_string(),
                        candidate_id,
                        job_id: job.id.clone(),
                    })
                }
            };
            outcomes.push(outcome);
        }

        let report = build_report(&job, outcomes);
        info!(
            job_id = %report.job_id,
            successful = report.successful_analyses,
            failed = report.failed_analyses,
            "Batch analysis complete"
        );
        report
    }
}
