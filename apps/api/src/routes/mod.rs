pub mod health;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::analysis::handlers;
use crate::state::AppState;

/// Public endpoints, listed in 404 responses and in the startup log.
pub const ENDPOINTS: &[&str] = &[
    "GET  /health",
    "GET  /api/debug-model",
    "POST /api/analyze-compatibility",
    "POST /api/batch-analyze",
];

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "message": "The requested route does not exist",
            "available_endpoints": ENDPOINTS
        })),
    )
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": "Method not allowed",
            "message": "The route exists but does not accept this HTTP method",
            "available_endpoints": ENDPOINTS
        })),
    )
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(health::health_handler).fallback(method_not_allowed),
        )
        // Path used by the first release of the frontend
        .route(
            "/api/health",
            get(health::health_handler).fallback(method_not_allowed),
        )
        .route(
            "/api/debug-model",
            get(health::debug_model_handler).fallback(method_not_allowed),
        )
        .route(
            "/api/analyze-compatibility",
            post(handlers::handle_analyze_compatibility).fallback(method_not_allowed),
        )
        .route(
            "/api/batch-analyze",
            post(handlers::handle_batch_analyze).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use crate::analysis::analyzer::tests::{payload_with_score, StubGenerator, StubReply};
    use crate::analysis::analyzer::Analyzer;
    use crate::analysis::batch::WorkerPool;
    use crate::config::{Config, DEFAULT_PORT};
    use crate::llm_client::{TextGenerator, MODEL};

    fn test_state(generator: Arc<dyn TextGenerator>) -> AppState {
        AppState {
            analyzer: Analyzer::new(generator),
            pool: WorkerPool::new(4),
            config: Config {
                google_api_key: None,
                port: DEFAULT_PORT,
                rust_log: "info".to_string(),
                batch_workers: 4,
            },
        }
    }

    /// Replies with a score taken from the candidate name ("Score 80" → 80)
    /// and counts every upstream call.
    fn counting_app(calls: Arc<AtomicUsize>) -> Router {
        let generator = StubGenerator(move |prompt: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            let score = prompt
                .lines()
                .find_map(|l| l.strip_prefix("Name: Score "))
                .and_then(|s| s.trim().parse::<u8>().ok());
            match score {
                Some(score) => StubReply::Text(format!("```json\n{}\n```", payload_with_score(score))),
                None => StubReply::Text("I am not JSON".to_string()),
            }
        });
        build_router(test_state(Arc::new(generator)))
    }

    fn app() -> Router {
        counting_app(Arc::new(AtomicUsize::new(0)))
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_status() {
        let response = app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["service"], "worktree-api");
        assert_eq!(body["api_key_configured"], false);
        assert!(body["version"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_legacy_health_path_is_served() {
        let response = app().oneshot(get_request("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_debug_model_reports_generation_config() {
        let response = app().oneshot(get_request("/api/debug-model")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["model_name"], "stub-model");
        assert_eq!(body["method"], "POST");
        assert_eq!(body["api_configured"], false);
        assert_eq!(body["generation_config"]["topK"], 40);
        assert_eq!(body["generation_config"]["maxOutputTokens"], 2048);
        let url = body["api_url"].as_str().unwrap();
        assert!(url.contains(MODEL));
        assert!(!url.contains("key="));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_with_endpoints() {
        let response = app().oneshot(get_request("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert!(body["error"].is_string());
        assert!(body["message"].is_string());
        let endpoints = body["available_endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), ENDPOINTS.len());
        assert!(endpoints.iter().any(|e| e == "POST /api/batch-analyze"));
    }

    #[tokio::test]
    async fn test_analyze_returns_flat_result() {
        let body = json!({
            "candidate": {"id": "cand-1", "name": "Score 83", "skills": ["Rust"]},
            "job": {"id": "job-1", "title": "Rust Engineer"}
        });
        let response = app()
            .oneshot(post_json("/api/analyze-compatibility", body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["compatibility_score"], 83);
        assert_eq!(body["metadata"]["candidate_id"], "cand-1");
        assert_eq!(body["metadata"]["job_id"], "job-1");
        assert_eq!(body["experience_match"]["assessment"], "Not assessed");
        assert_eq!(body["salary_expectation"]["job_salary"], "N/A");
    }

    #[tokio::test]
    async fn test_analyze_rejects_job_string() {
        let calls = Arc::new(AtomicUsize::new(0));
        let body = json!({"candidate": {"name": "Score 50"}, "job": "Rust Engineer"});
        let response = counting_app(calls.clone())
            .oneshot(post_json("/api/analyze-compatibility", body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_body() {
        let response = app()
            .oneshot(post_json("/api/analyze-compatibility", String::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Request body is required");
    }

    #[tokio::test]
    async fn test_analyze_failure_is_500_with_details() {
        let body = json!({"candidate": {"id": 5, "name": "Nobody"}, "job": {"id": 9}});
        let response = app()
            .oneshot(post_json("/api/analyze-compatibility", body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(body["error"].is_string());
        assert_eq!(body["kind"], "ResponsePayloadInvalid");
        assert!(body["details"].as_str().unwrap().contains("I am not JSON"));
        assert_eq!(body["candidate_id"], 5);
        assert_eq!(body["job_id"], 9);
    }

    #[tokio::test]
    async fn test_batch_ranks_and_reports_failures() {
        let body = json!({
            "job": {"id": "job-9", "title": "Platform Engineer"},
            "candidates": [
                {"id": "a", "name": "Score 40"},
                {"id": "b", "name": "Nobody"},
                {"id": "c", "name": "Score 95"},
                {"id": "d", "name": "Score 70"},
                {"id": "e"}
            ]
        });
        let response = app()
            .oneshot(post_json("/api/batch-analyze", body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["job_id"], "job-9");
        assert_eq!(body["job_title"], "Platform Engineer");
        assert_eq!(body["total_candidates"], 5);
        assert_eq!(body["successful_analyses"], 3);
        assert_eq!(body["failed_analyses"], 2);
        assert!(body["analyzed_at"].is_string());

        let scores: Vec<u64> = body["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["compatibility_score"].as_u64().unwrap())
            .collect();
        assert_eq!(scores, vec![95, 70, 40]);

        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| e["error"] == "ResponsePayloadInvalid" && e["job_id"] == "job-9"));
    }

    #[tokio::test]
    async fn test_batch_all_success_has_null_errors() {
        let body = json!({
            "job": {"id": 1},
            "candidates": [{"name": "Score 10"}, {"name": "Score 20"}]
        });
        let response = app()
            .oneshot(post_json("/api/batch-analyze", body.to_string()))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["failed_analyses"], 0);
        assert!(body["errors"].is_null());
    }

    #[tokio::test]
    async fn test_batch_over_limit_is_rejected_without_analysis() {
        let calls = Arc::new(AtomicUsize::new(0));
        let candidates: Vec<Value> = (0..51)
            .map(|i| json!({"id": i, "name": "Score 50"}))
            .collect();
        let body = json!({"job": {"id": 1}, "candidates": candidates});

        let response = counting_app(calls.clone())
            .oneshot(post_json("/api/batch-analyze", body.to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("at most 50"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_rejects_empty_and_non_array_candidates() {
        for candidates in [json!([]), json!("everyone"), Value::Null] {
            let body = json!({"job": {"id": 1}, "candidates": candidates});
            let response = app()
                .oneshot(post_json("/api/batch-analyze", body.to_string()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_wrong_method_is_405_with_json_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cases = [
            get_request("/api/batch-analyze"),
            get_request("/api/analyze-compatibility"),
            post_json("/health", String::new()),
        ];

        for request in cases {
            let response = counting_app(calls.clone()).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

            let body = body_json(response).await;
            assert_eq!(body["error"], "Method not allowed");
            assert!(body["message"].is_string());
            assert_eq!(
                body["available_endpoints"].as_array().unwrap().len(),
                ENDPOINTS.len()
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
