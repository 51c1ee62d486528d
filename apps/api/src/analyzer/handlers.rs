use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::analyzer::AnalysisReport;
use crate::entitlements::plans::MeteredAction;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub user_id: Uuid,
    /// Extracted resume text, usually straight from /resumes/extract.
    pub resume_text: String,
    pub target_role: String,
    pub job_description: Option<String>,
}

/// POST /api/v1/analyses
///
/// The canonical gated flow: check the entitlement, run the analysis, and
/// record one unit of usage only after the analysis succeeded.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisReport>, AppError> {
    if req.resume_text.trim().len() < 10 {
        return Err(AppError::Validation(
            "resume_text must contain at least 10 characters".to_string(),
        ));
    }
    if req.target_role.trim().is_empty() {
        return Err(AppError::Validation(
            "target_role must not be empty".to_string(),
        ));
    }

    info!(
        "analysis requested by {} for role {:?}",
        req.user_id, req.target_role
    );

    let analyzer = state.analyzer.clone();
    let report = state
        .gate
        .with_subscription_check(req.user_id, MeteredAction::ResumeAnalysis, || async {
            analyzer
                .analyze(
                    &req.resume_text,
                    &req.target_role,
                    req.job_description.as_deref(),
                )
                .await
                .map_err(anyhow::Error::from)
        })
        .await?;

    Ok(Json(report))
}
