use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::llm_client::{GEMINI_API_URL, GENERATION_CONFIG};
use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and credential status.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "service": "worktree-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "api_key_configured": state.config.api_key_configured(),
        "model": state.analyzer.model()
    }))
}

/// GET /api/debug-model
/// Upstream model, endpoint and generation parameters. Never includes the key.
pub async fn debug_model_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "model_name": state.analyzer.model(),
        "api_url": GEMINI_API_URL,
        "method": "POST",
        "api_configured": state.config.api_key_configured(),
        "generation_config": GENERATION_CONFIG,
        "timestamp": Utc::now().to_rfc3339()
    }))
}
