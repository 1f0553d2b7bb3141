mod analysis;
mod config;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::analyzer::Analyzer;
use crate::analysis::batch::WorkerPool;
use crate::config::Config;
use crate::errors::panic_response;
use crate::llm_client::GeminiClient;
use crate::routes::{build_router, ENDPOINTS};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed PORT / BATCH_WORKERS)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={level},tower_http={level}",
                env!("CARGO_CRATE_NAME"),
                level = &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting WorkTree API v{}", env!("CARGO_PKG_VERSION"));

    if config.api_key_configured() {
        info!("GOOGLE_API_KEY configured");
    } else {
        warn!("GOOGLE_API_KEY is not configured; every analysis call will fail");
    }

    // Initialize LLM client
    let llm = GeminiClient::new(config.google_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let analyzer = Analyzer::new(Arc::new(llm));
    let pool = WorkerPool::new(config.batch_workers);
    info!("Batch worker pool initialized ({} workers)", pool.size());

    let state = AppState {
        analyzer,
        pool,
        config: config.clone(),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(CatchPanicLayer::custom(panic_response)),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");
    for endpoint in ENDPOINTS {
        info!("  {endpoint}");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
