mod analyzer;
mod config;
mod db;
mod entitlements;
mod errors;
mod extraction;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analyzer::{HeuristicAnalyzer, LlmAnalyzer, ResumeAnalyzer};
use crate::config::Config;
use crate::db::create_pool;
use crate::entitlements::plans::PlanCatalog;
use crate::entitlements::store::{PgSubscriptionStore, PgUsageStore, SubscriptionStore, UsageStore};
use crate::entitlements::EntitlementGate;
use crate::extraction::{DocumentExtractor, ExtractorConfig};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeIQ API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Document extractor with its limits injected from config
    let extractor = DocumentExtractor::new(ExtractorConfig {
        max_file_size_bytes: config.max_upload_bytes,
        ..ExtractorConfig::default()
    });

    // Entitlement gate over the Postgres-backed stores
    let subscriptions: Arc<dyn SubscriptionStore> =
        Arc::new(PgSubscriptionStore::new(db.clone()));
    let usage: Arc<dyn UsageStore> = Arc::new(PgUsageStore::new(db.clone()));
    let gate = Arc::new(EntitlementGate::new(
        subscriptions,
        usage,
        PlanCatalog::default(),
    ));

    // Analysis backend: Claude when a key is configured, heuristic otherwise
    let resume_analyzer: Arc<dyn ResumeAnalyzer> = match &config.anthropic_api_key {
        Some(key) => {
            info!("LLM analyzer initialized (model: {})", analyzer::client::MODEL);
            Arc::new(LlmAnalyzer::new(key.clone()))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set, falling back to heuristic analyzer");
            Arc::new(HeuristicAnalyzer)
        }
    };

    // Build app state
    let state = AppState {
        db,
        extractor,
        gate,
        analyzer: resume_analyzer,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
