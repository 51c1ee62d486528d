pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analyzer::handlers as analysis_handlers;
use crate::entitlements::handlers as entitlement_handlers;
use crate::extraction::handlers as extraction_handlers;
use crate::state::AppState;

/// Room for a 10 MiB document plus multipart framing. The extractor applies
/// the real limit and produces the typed FILE_TOO_LARGE error.
const BODY_LIMIT_BYTES: usize = 12 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Extraction
        .route(
            "/api/v1/resumes/extract",
            post(extraction_handlers::handle_extract),
        )
        // Gated analysis
        .route("/api/v1/analyses", post(analysis_handlers::handle_analyze))
        // Entitlements
        .route(
            "/api/v1/entitlements/check",
            post(entitlement_handlers::handle_check),
        )
        .route(
            "/api/v1/entitlements/:user_id",
            get(entitlement_handlers::handle_snapshot),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}
