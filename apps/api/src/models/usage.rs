use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the `usage_counters` table: how many times one user performed
/// one action in one calendar month. Created on first use, incremented
/// atomically, never decremented.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageCounterRow {
    pub user_id: Uuid,
    pub action_type: String,
    pub month: i32,
    pub year: i32,
    pub count: i64,
}
