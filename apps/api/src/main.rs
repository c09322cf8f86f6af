mod config;
mod db;
mod enhancement;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, PgResumeStore};
use crate::enhancement::orchestrator::Orchestrator;
use crate::llm_client::rate_limiter::RateLimiter;
use crate::llm_client::transport::GeminiTransport;
use crate::llm_client::{GenerativeClient, RetryPolicy};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Enhancer v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    // One limiter per process: every service call goes through it
    let limiter = Arc::new(RateLimiter::new(config.llm_min_spacing));
    let transport = Arc::new(GeminiTransport::new(
        &config.gemini_base_url,
        &config.gemini_model,
        config.gemini_api_key.clone(),
    ));
    info!("Generative endpoint: {}", transport.endpoint());
    let client = GenerativeClient::new(
        transport,
        limiter,
        RetryPolicy {
            max_attempts: config.llm_max_attempts,
            base_delay: config.llm_base_delay,
        },
    );
    info!(
        "Generative client initialized (model: {}, spacing: {:?}, attempts: {})",
        config.gemini_model, config.llm_min_spacing, config.llm_max_attempts
    );

    // Build app state
    let state = AppState {
        store: Arc::new(PgResumeStore::new(db)),
        orchestrator: Orchestrator::new(client),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
