use crate::analysis::analyzer::Analyzer;
use crate::analysis::batch::WorkerPool;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Wraps the upstream `TextGenerator`; the only path to the LLM.
    pub analyzer: Analyzer,
    /// Bounded batch pool, built once at startup.
    pub pool: WorkerPool,
    pub config: Config,
}
