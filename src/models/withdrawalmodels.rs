use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "withdrawal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Requested,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub points: i64,
    pub idempotency_key: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a withdrawal attempt against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawalOutcome {
    Created(Withdrawal),
    /// The idempotency key was already used; nothing was deducted.
    Replayed(Withdrawal),
    InsufficientPoints { available: i64 },
    ProfileMissing,
}
