use std::sync::Arc;

use sqlx::PgPool;

use crate::analyzer::ResumeAnalyzer;
use crate::config::Config;
use crate::entitlements::EntitlementGate;
use crate::extraction::DocumentExtractor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pool kept here for handlers that need ad-hoc queries; the stores
    /// inside the gate hold their own clones.
    #[allow(dead_code)]
    pub db: PgPool,
    pub extractor: DocumentExtractor,
    pub gate: Arc<EntitlementGate>,
    /// Pluggable analysis backend. LlmAnalyzer in production, swapped for
    /// the heuristic backend when no API key is configured.
    pub analyzer: Arc<dyn ResumeAnalyzer>,
    /// Resolved startup configuration, kept for handlers that need it.
    #[allow(dead_code)]
    pub config: Config,
}
