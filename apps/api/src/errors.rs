#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::entitlements::EntitlementError;
use crate::extraction::ExtractionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A metered action was denied by the entitlement gate.
    #[error("{0}")]
    PlanLimit(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<EntitlementError> for AppError {
    fn from(err: EntitlementError) -> Self {
        match err {
            EntitlementError::Denied(reason) => AppError::PlanLimit(reason),
            EntitlementError::Action(e) | EntitlementError::Recording(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PlanLimit(msg) => (StatusCode::FORBIDDEN, "PLAN_LIMIT_REACHED", msg.clone()),
            AppError::Extraction(e) => (extraction_status(e), e.code(), e.to_string()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// HTTP status for each extraction failure. The body `code` is what clients
/// branch on; the status just places it in the right family.
fn extraction_status(err: &ExtractionError) -> StatusCode {
    match err {
        ExtractionError::InvalidFile | ExtractionError::EmptyFile => StatusCode::BAD_REQUEST,
        ExtractionError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ExtractionError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ExtractionError::PdfExtractionFailed(_)
        | ExtractionError::WordExtractionFailed(_)
        | ExtractionError::NoTextExtracted => StatusCode::UNPROCESSABLE_ENTITY,
        ExtractionError::InvalidResult | ExtractionError::Unknown(_) => {
            tracing::error!("extraction internal failure: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
