//! Storage ports for the entitlement gate, plus their Postgres adapters.
//!
//! The gate only ever needs two capabilities from the datastore: "most
//! recent active subscription row for a user" and "atomically bump a
//! per-user/action/period counter". Keeping them behind traits lets tests
//! drive the gate with in-memory doubles.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entitlements::plans::MeteredAction;
use crate::models::subscription::SubscriptionRow;
use crate::models::usage::UsageCounterRow;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The most recent subscription row with status `active`, if any.
    async fn latest_active(&self, user_id: Uuid) -> Result<Option<SubscriptionRow>>;
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// All usage rows for the user in the given calendar period.
    async fn counts_for_period(
        &self,
        user_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<Vec<UsageCounterRow>>;

    /// Adds one to the counter for `(user, action, month, year)`, creating
    /// the row at 1 if absent. Must be a single atomic statement; a
    /// read-then-write from here would lose updates under concurrent
    /// requests.
    async fn increment(
        &self,
        user_id: Uuid,
        action: MeteredAction,
        month: u32,
        year: i32,
    ) -> Result<()>;
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres adapters
// ────────────────────────────────────────────────────────────────────────────

pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn latest_active(&self, user_id: Uuid) -> Result<Option<SubscriptionRow>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, plan_name, status, current_period_end, created_at
            FROM subscriptions
            WHERE user_id = $1 AND status = 'active'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading latest active subscription")?;

        Ok(row)
    }
}

pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn counts_for_period(
        &self,
        user_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<Vec<UsageCounterRow>> {
        let rows: Vec<UsageCounterRow> = sqlx::query_as(
            r#"
            SELECT user_id, action_type, month, year, count
            FROM usage_counters
            WHERE user_id = $1 AND month = $2 AND year = $3
            "#,
        )
        .bind(user_id)
        .bind(month as i32)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .context("loading usage counters for period")?;

        Ok(rows)
    }

    async fn increment(
        &self,
        user_id: Uuid,
        action: MeteredAction,
        month: u32,
        year: i32,
    ) -> Result<()> {
        // The upsert is the atomicity primitive. Postgres serializes the
        // conflicting increments, so N concurrent calls always land on N.
        sqlx::query(
            r#"
            INSERT INTO usage_counters (user_id, action_type, month, year, count)
            VALUES ($1, $2, $3, $4, 1)
            ON CONFLICT (user_id, action_type, month, year)
            DO UPDATE SET count = usage_counters.count + 1
            "#,
        )
        .bind(user_id)
        .bind(action.as_str())
        .bind(month as i32)
        .bind(year)
        .execute(&self.pool)
        .await
        .context("incrementing usage counter")?;

        Ok(())
    }
}
