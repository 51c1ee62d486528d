//! The entitlement gate: decides whether a metered action may proceed for a
//! user, and records usage once an action actually happened.
//!
//! Reads fail open, but only to the most conservative state (free plan,
//! zero usage). Writes propagate; losing a usage record silently would make
//! the accounting lie.

pub mod handlers;
pub mod plans;
pub mod store;

use std::future::Future;
use std::sync::Arc;

use chrono::{Datelike, Local, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entitlements::plans::{MeteredAction, Plan, PlanCatalog, PlanLimits, UNLIMITED};
use crate::entitlements::store::{SubscriptionStore, UsageStore};

/// The user's effective subscription at a moment in time. Recomputed from
/// the store on every check; never cached or mutated in place.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    pub plan: Plan,
    pub status: String,
    pub is_active: bool,
    pub current_period_end: Option<chrono::DateTime<Utc>>,
    pub limits: PlanLimits,
}

/// Current-month usage counters for one user. Missing rows read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageInfo {
    pub resume_analyses: i64,
    pub resume_creations: i64,
    pub resume_downloads: i64,
    pub cover_letter_analyses: i64,
    pub resume_tailoring: i64,
    pub ai_section_tailoring: i64,
}

impl UsageInfo {
    pub fn count_for(&self, action: MeteredAction) -> i64 {
        match action {
            MeteredAction::ResumeAnalysis => self.resume_analyses,
            MeteredAction::ResumeCreation => self.resume_creations,
            MeteredAction::ResumeDownload => self.resume_downloads,
            MeteredAction::CoverLetterAnalysis => self.cover_letter_analyses,
            MeteredAction::ResumeTailoring => self.resume_tailoring,
            MeteredAction::AiSectionTailoring => self.ai_section_tailoring,
        }
    }

    fn set(&mut self, action: MeteredAction, count: i64) {
        match action {
            MeteredAction::ResumeAnalysis => self.resume_analyses = count,
            MeteredAction::ResumeCreation => self.resume_creations = count,
            MeteredAction::ResumeDownload => self.resume_downloads = count,
            MeteredAction::CoverLetterAnalysis => self.cover_letter_analyses = count,
            MeteredAction::ResumeTailoring => self.resume_tailoring = count,
            MeteredAction::AiSectionTailoring => self.ai_section_tailoring = count,
        }
    }
}

/// The gate's answer to "may user U perform action A right now?".
#[derive(Debug, Clone, Serialize)]
pub struct ActionDecision {
    pub can_perform: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub usage: UsageInfo,
    pub limits: PlanLimits,
}

#[derive(Debug, Error)]
pub enum EntitlementError {
    /// The gate said no. Carries the user-facing reason.
    #[error("{0}")]
    Denied(String),

    /// The wrapped action itself failed. No usage was recorded.
    #[error("action failed: {0}")]
    Action(anyhow::Error),

    /// The action succeeded but recording its usage did not. Surfaced so
    /// callers never silently lose quota accounting.
    #[error("failed to record usage: {0}")]
    Recording(anyhow::Error),
}

pub struct EntitlementGate {
    subscriptions: Arc<dyn SubscriptionStore>,
    usage: Arc<dyn UsageStore>,
    catalog: PlanCatalog,
}

impl EntitlementGate {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        usage: Arc<dyn UsageStore>,
        catalog: PlanCatalog,
    ) -> Self {
        Self {
            subscriptions,
            usage,
            catalog,
        }
    }

    /// Resolves the user's effective subscription.
    ///
    /// A lapsed paid plan must never keep granting paid limits, so a row
    /// whose period end has passed is forced down to free. A store failure
    /// also resolves to free: availability over strictness on this read
    /// path, and the fallback is logged because it masks a backend outage.
    pub async fn subscription_for(&self, user_id: Uuid) -> SubscriptionInfo {
        let row = match self.subscriptions.latest_active(user_id).await {
            Ok(row) => row,
            Err(e) => {
                warn!("subscription lookup failed for {user_id}, falling back to free plan: {e:#}");
                return self.free_subscription("unknown");
            }
        };

        match row {
            Some(row) => {
                let lapsed = row
                    .current_period_end
                    .map(|end| end < Utc::now())
                    .unwrap_or(false);
                let plan = if lapsed {
                    debug!(
                        "subscription for {user_id} lapsed at {:?}, treating as free",
                        row.current_period_end
                    );
                    Plan::Free
                } else {
                    Plan::from_db(&row.plan_name)
                };

                SubscriptionInfo {
                    plan,
                    status: row.status,
                    is_active: !lapsed,
                    current_period_end: row.current_period_end,
                    limits: self.catalog.limits_for(plan),
                }
            }
            None => self.free_subscription("none"),
        }
    }

    /// Resolves the user's usage counters for the current calendar period.
    /// A store failure reads as zero usage; combined with the subscription
    /// fallback the worst case on outage is "free plan, nothing used yet".
    pub async fn usage_for(&self, user_id: Uuid) -> UsageInfo {
        let (month, year) = current_period();
        let rows = match self.usage.counts_for_period(user_id, month, year).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("usage lookup failed for {user_id}, treating as zero usage: {e:#}");
                return UsageInfo::default();
            }
        };

        let mut usage = UsageInfo::default();
        for row in rows {
            match row.action_type.parse::<MeteredAction>() {
                Ok(action) => usage.set(action, row.count),
                Err(_) => warn!(
                    "ignoring usage row with unknown action type {:?}",
                    row.action_type
                ),
            }
        }
        usage
    }

    /// Answers whether `user_id` may perform `action` right now.
    ///
    /// Limit N permits exactly N actions per period: reaching the limit
    /// blocks the next one.
    pub async fn can_perform(&self, user_id: Uuid, action: MeteredAction) -> ActionDecision {
        let (subscription, usage) =
            tokio::join!(self.subscription_for(user_id), self.usage_for(user_id));

        let limits = subscription.limits;
        let cap = limits.cap_for(action);
        let used = usage.count_for(action);

        if cap == UNLIMITED || used < cap {
            return ActionDecision {
                can_perform: true,
                reason: None,
                usage,
                limits,
            };
        }

        ActionDecision {
            can_perform: false,
            reason: Some(format!(
                "The {} plan allows {} {} action(s) per month and you have used {}. \
                 Upgrade your plan to continue.",
                subscription.plan,
                cap,
                action.label(),
                used,
            )),
            usage,
            limits,
        }
    }

    /// Wire-facing variant taking the action as a string. Unknown action
    /// identifiers are rejected outright without touching the datastore.
    pub async fn can_perform_action(&self, user_id: Uuid, action: &str) -> ActionDecision {
        match action.parse::<MeteredAction>() {
            Ok(action) => self.can_perform(user_id, action).await,
            Err(_) => ActionDecision {
                can_perform: false,
                reason: Some(format!("'{action}' is not a recognized action type")),
                usage: UsageInfo::default(),
                limits: self.catalog.limits_for(Plan::Free),
            },
        }
    }

    /// Records one unit of usage for `(user, action)` in the current period.
    /// Delegates atomicity to the store's single upsert-increment statement.
    pub async fn record_usage(&self, user_id: Uuid, action: MeteredAction) -> anyhow::Result<()> {
        let (month, year) = current_period();
        self.usage.increment(user_id, action, month, year).await
    }

    /// Checks permission, runs `op`, and records usage only after `op`
    /// succeeded. A denied check never invokes `op`; a failed `op` never
    /// consumes quota. Act-then-record is the invariant the whole gate
    /// exists to uphold.
    pub async fn with_subscription_check<T, F, Fut>(
        &self,
        user_id: Uuid,
        action: MeteredAction,
        op: F,
    ) -> Result<T, EntitlementError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let decision = self.can_perform(user_id, action).await;
        if !decision.can_perform {
            let reason = decision
                .reason
                .unwrap_or_else(|| "Action not permitted on the current plan".to_string());
            return Err(EntitlementError::Denied(reason));
        }

        let value = op().await.map_err(EntitlementError::Action)?;

        self.record_usage(user_id, action)
            .await
            .map_err(EntitlementError::Recording)?;

        debug!("recorded {action} usage for {user_id}");
        Ok(value)
    }

    fn free_subscription(&self, status: &str) -> SubscriptionInfo {
        SubscriptionInfo {
            plan: Plan::Free,
            status: status.to_string(),
            is_active: false,
            current_period_end: None,
            limits: self.catalog.limits_for(Plan::Free),
        }
    }
}

/// Server-local calendar month and year, derived at call time.
fn current_period() -> (u32, i32) {
    let now = Local::now();
    (now.month(), now.year())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::SubscriptionRow;
    use crate::models::usage::UsageCounterRow;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedSubscriptions {
        row: Option<SubscriptionRow>,
        calls: AtomicUsize,
    }

    impl FixedSubscriptions {
        fn new(row: Option<SubscriptionRow>) -> Self {
            Self {
                row,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SubscriptionStore for FixedSubscriptions {
        async fn latest_active(&self, _user_id: Uuid) -> Result<Option<SubscriptionRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.row.clone())
        }
    }

    struct FailingSubscriptions;

    #[async_trait]
    impl SubscriptionStore for FailingSubscriptions {
        async fn latest_active(&self, _user_id: Uuid) -> Result<Option<SubscriptionRow>> {
            Err(anyhow!("datastore unreachable"))
        }
    }

    #[derive(Default)]
    struct MemoryUsage {
        counts: Mutex<HashMap<(Uuid, &'static str), i64>>,
        increments: AtomicUsize,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl MemoryUsage {
        fn with_count(user_id: Uuid, action: MeteredAction, count: i64) -> Self {
            let store = Self::default();
            store
                .counts
                .lock()
                .unwrap()
                .insert((user_id, action.as_str()), count);
            store
        }

        fn count(&self, user_id: Uuid, action: MeteredAction) -> i64 {
            *self
                .counts
                .lock()
                .unwrap()
                .get(&(user_id, action.as_str()))
                .unwrap_or(&0)
        }
    }

    #[async_trait]
    impl UsageStore for MemoryUsage {
        async fn counts_for_period(
            &self,
            user_id: Uuid,
            month: u32,
            year: i32,
        ) -> Result<Vec<UsageCounterRow>> {
            if self.fail_reads {
                return Err(anyhow!("datastore unreachable"));
            }
            let counts = self.counts.lock().unwrap();
            Ok(counts
                .iter()
                .filter(|((uid, _), _)| *uid == user_id)
                .map(|((uid, action), count)| UsageCounterRow {
                    user_id: *uid,
                    action_type: action.to_string(),
                    month: month as i32,
                    year,
                    count: *count,
                })
                .collect())
        }

        async fn increment(
            &self,
            user_id: Uuid,
            action: MeteredAction,
            _month: u32,
            _year: i32,
        ) -> Result<()> {
            if self.fail_writes {
                return Err(anyhow!("datastore unreachable"));
            }
            self.increments.fetch_add(1, Ordering::SeqCst);
            *self
                .counts
                .lock()
                .unwrap()
                .entry((user_id, action.as_str()))
                .or_insert(0) += 1;
            Ok(())
        }
    }

    fn active_row(user_id: Uuid, plan_name: &str, days_left: i64) -> SubscriptionRow {
        SubscriptionRow {
            id: Uuid::new_v4(),
            user_id,
            plan_name: plan_name.to_string(),
            status: "active".to_string(),
            current_period_end: Some(Utc::now() + Duration::days(days_left)),
            created_at: Utc::now() - Duration::days(3),
        }
    }

    fn gate(
        subscriptions: impl SubscriptionStore + 'static,
        usage: Arc<MemoryUsage>,
    ) -> EntitlementGate {
        EntitlementGate::new(Arc::new(subscriptions), usage, PlanCatalog::default())
    }

    #[tokio::test]
    async fn test_free_plan_at_limit_denies_with_numeric_reason() {
        let user = Uuid::new_v4();
        let usage = Arc::new(MemoryUsage::with_count(
            user,
            MeteredAction::ResumeAnalysis,
            3,
        ));
        let gate = gate(FixedSubscriptions::new(None), usage);

        let decision = gate.can_perform(user, MeteredAction::ResumeAnalysis).await;
        assert!(!decision.can_perform);
        let reason = decision.reason.unwrap();
        assert!(reason.contains('3'), "reason should name the cap: {reason}");
        assert!(reason.contains("resume analysis"));
        assert!(reason.to_lowercase().contains("upgrade"));
    }

    #[tokio::test]
    async fn test_free_plan_under_limit_allows() {
        let user = Uuid::new_v4();
        let usage = Arc::new(MemoryUsage::with_count(
            user,
            MeteredAction::ResumeAnalysis,
            2,
        ));
        let gate = gate(FixedSubscriptions::new(None), usage);

        let decision = gate.can_perform(user, MeteredAction::ResumeAnalysis).await;
        assert!(decision.can_perform);
        assert!(decision.reason.is_none());
        assert_eq!(decision.usage.resume_analyses, 2);
        assert_eq!(decision.limits.resume_analyses, 3);
    }

    #[tokio::test]
    async fn test_free_plan_zero_cap_action_denied_at_zero_usage() {
        let user = Uuid::new_v4();
        let gate = gate(
            FixedSubscriptions::new(None),
            Arc::new(MemoryUsage::default()),
        );

        let decision = gate.can_perform(user, MeteredAction::ResumeDownload).await;
        assert!(!decision.can_perform);
    }

    #[tokio::test]
    async fn test_unlimited_plan_allows_every_action_at_any_usage() {
        let user = Uuid::new_v4();
        let usage = MemoryUsage::default();
        for action in MeteredAction::ALL {
            usage
                .counts
                .lock()
                .unwrap()
                .insert((user, action.as_str()), 10_000);
        }
        let gate = gate(
            FixedSubscriptions::new(Some(active_row(user, "unlimited", 30))),
            Arc::new(usage),
        );

        for action in MeteredAction::ALL {
            let decision = gate.can_perform(user, action).await;
            assert!(decision.can_perform, "unlimited should allow {action}");
        }
    }

    #[tokio::test]
    async fn test_lapsed_paid_plan_resolves_to_free() {
        let user = Uuid::new_v4();
        let gate = gate(
            FixedSubscriptions::new(Some(active_row(user, "unlimited", -1))),
            Arc::new(MemoryUsage::default()),
        );

        let subscription = gate.subscription_for(user).await;
        assert_eq!(subscription.plan, Plan::Free);
        assert!(!subscription.is_active);
        assert_eq!(subscription.limits.resume_analyses, 3);
    }

    #[tokio::test]
    async fn test_subscription_store_error_falls_back_to_free() {
        let user = Uuid::new_v4();
        let gate = EntitlementGate::new(
            Arc::new(FailingSubscriptions),
            Arc::new(MemoryUsage::default()),
            PlanCatalog::default(),
        );

        let subscription = gate.subscription_for(user).await;
        assert_eq!(subscription.plan, Plan::Free);
        assert_eq!(subscription.limits.resume_analyses, 3);
    }

    #[tokio::test]
    async fn test_usage_store_error_reads_as_zero() {
        let user = Uuid::new_v4();
        let usage = Arc::new(MemoryUsage {
            fail_reads: true,
            ..MemoryUsage::default()
        });
        let gate = gate(FixedSubscriptions::new(None), usage);

        let decision = gate.can_perform(user, MeteredAction::ResumeAnalysis).await;
        assert!(decision.can_perform);
        assert_eq!(decision.usage.resume_analyses, 0);
    }

    #[tokio::test]
    async fn test_unknown_action_rejected_without_store_access() {
        let user = Uuid::new_v4();
        let subscriptions = Arc::new(FixedSubscriptions::new(None));
        let usage = Arc::new(MemoryUsage::default());
        let gate = EntitlementGate::new(
            subscriptions.clone(),
            usage.clone(),
            PlanCatalog::default(),
        );

        let decision = gate.can_perform_action(user, "mass_apply").await;
        assert!(!decision.can_perform);
        assert!(decision.reason.unwrap().contains("mass_apply"));
        assert_eq!(subscriptions.calls.load(Ordering::SeqCst), 0);
        assert_eq!(usage.increments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_known_action_string_routes_to_decision() {
        let user = Uuid::new_v4();
        let gate = gate(
            FixedSubscriptions::new(None),
            Arc::new(MemoryUsage::default()),
        );

        let decision = gate.can_perform_action(user, "resume_analysis").await;
        assert!(decision.can_perform);
    }

    #[tokio::test]
    async fn test_denied_check_never_invokes_callback() {
        let user = Uuid::new_v4();
        let usage = Arc::new(MemoryUsage::with_count(
            user,
            MeteredAction::ResumeAnalysis,
            3,
        ));
        let gate = gate(FixedSubscriptions::new(None), usage.clone());

        let invoked = AtomicUsize::new(0);
        let result = gate
            .with_subscription_check(user, MeteredAction::ResumeAnalysis, || async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;

        assert!(matches!(result, Err(EntitlementError::Denied(_))));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(usage.increments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_callback_consumes_no_quota() {
        let user = Uuid::new_v4();
        let usage = Arc::new(MemoryUsage::default());
        let gate = gate(FixedSubscriptions::new(None), usage.clone());

        let result: Result<(), _> = gate
            .with_subscription_check(user, MeteredAction::ResumeAnalysis, || async {
                Err(anyhow!("model call timed out"))
            })
            .await;

        assert!(matches!(result, Err(EntitlementError::Action(_))));
        assert_eq!(usage.increments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_callback_records_usage_exactly_once() {
        let user = Uuid::new_v4();
        let usage = Arc::new(MemoryUsage::default());
        let gate = gate(FixedSubscriptions::new(None), usage.clone());

        let value = gate
            .with_subscription_check(user, MeteredAction::ResumeCreation, || async { Ok("done") })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(usage.increments.load(Ordering::SeqCst), 1);
        assert_eq!(usage.count(user, MeteredAction::ResumeCreation), 1);
        assert_eq!(usage.count(user, MeteredAction::ResumeAnalysis), 0);
    }

    #[tokio::test]
    async fn test_recording_failure_propagates() {
        let user = Uuid::new_v4();
        let usage = Arc::new(MemoryUsage {
            fail_writes: true,
            ..MemoryUsage::default()
        });
        let gate = gate(FixedSubscriptions::new(None), usage);

        let result = gate
            .with_subscription_check(user, MeteredAction::ResumeAnalysis, || async { Ok(()) })
            .await;

        assert!(matches!(result, Err(EntitlementError::Recording(_))));
    }

    #[tokio::test]
    async fn test_concurrent_increments_lose_no_updates() {
        let user = Uuid::new_v4();
        let usage = Arc::new(MemoryUsage::default());
        let gate = Arc::new(EntitlementGate::new(
            Arc::new(FixedSubscriptions::new(Some(active_row(
                user,
                "unlimited",
                30,
            )))),
            usage.clone(),
            PlanCatalog::default(),
        ));

        let mut handles = Vec::new();
        for _ in 0..25 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.record_usage(user, MeteredAction::ResumeAnalysis).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(usage.count(user, MeteredAction::ResumeAnalysis), 25);
    }

    #[tokio::test]
    async fn test_usage_rows_with_unknown_actions_are_ignored() {
        let user = Uuid::new_v4();
        let usage = MemoryUsage::default();
        usage
            .counts
            .lock()
            .unwrap()
            .insert((user, "legacy_action"), 7);
        let gate = gate(FixedSubscriptions::new(None), Arc::new(usage));

        let info = gate.usage_for(user).await;
        assert_eq!(info, UsageInfo::default());
    }
}
