use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlements::{ActionDecision, SubscriptionInfo, UsageInfo};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub user_id: Uuid,
    /// Wire-level action name, e.g. "resume_analysis". Unknown names come
    /// back as a denial without hitting the datastore.
    pub action: String,
}

/// POST /api/v1/entitlements/check
pub async fn handle_check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<ActionDecision>, AppError> {
    let decision = state.gate.can_perform_action(req.user_id, &req.action).await;
    Ok(Json(decision))
}

#[derive(Debug, Serialize)]
pub struct EntitlementSnapshot {
    pub subscription: SubscriptionInfo,
    pub usage: UsageInfo,
}

/// GET /api/v1/entitlements/:user_id
///
/// Current plan, limits, and month-to-date usage for display. Users without
/// a subscription row simply see the free plan with zero usage.
pub async fn handle_snapshot(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<EntitlementSnapshot>, AppError> {
    let (subscription, usage) = tokio::join!(
        state.gate.subscription_for(user_id),
        state.gate.usage_for(user_id)
    );
    Ok(Json(EntitlementSnapshot {
        subscription,
        usage,
    }))
}
