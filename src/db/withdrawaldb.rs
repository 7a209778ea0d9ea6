use async_trait::async_trait;
use uuid::Uuid;

use super::{DBClient, StoreError, WithdrawalExt};
use crate::models::withdrawalmodels::{Withdrawal, WithdrawalOutcome, WithdrawalStatus};

const WITHDRAWAL_COLUMNS: &str = "id, user_id, points, idempotency_key, status, created_at";

#[async_trait]
impl WithdrawalExt for DBClient {
    async fn request_withdrawal(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
        points: i64,
    ) -> Result<WithdrawalOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The row lock serialises requests from the same user, so the replay
        // check below cannot race a concurrent insert with the same key.
        let available = sqlx::query_scalar::<_, i64>(
            "SELECT points FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(available) = available else {
            tx.rollback().await?;
            return Ok(WithdrawalOutcome::ProfileMissing);
        };

        let existing = sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {} FROM withdrawals WHERE user_id = $1 AND idempotency_key = $2",
            WITHDRAWAL_COLUMNS
        ))
        .bind(user_id)
        .bind(idempotency_key)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            tx.rollback().await?;
            return Ok(WithdrawalOutcome::Replayed(existing));
        }

        if available < points {
            tx.rollback().await?;
            return Ok(WithdrawalOutcome::InsufficientPoints { available });
        }

        sqlx::query(
            r#"
            UPDATE users
            SET points = points - $2, withdrawals = withdrawals + 1
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(points)
        .execute(&mut *tx)
        .await?;

        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            INSERT INTO withdrawals (id, user_id, points, idempotency_key, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            WITHDRAWAL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(points)
        .bind(idempotency_key)
        .bind(WithdrawalStatus::Requested)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WithdrawalOutcome::Created(withdrawal))
    }

    async fn get_withdrawal(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Withdrawal>, StoreError> {
        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {} FROM withdrawals WHERE user_id = $1 AND idempotency_key = $2",
            WITHDRAWAL_COLUMNS
        ))
        .bind(user_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(withdrawal)
    }

    async fn get_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, StoreError> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {} FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC",
            WITHDRAWAL_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }
}
