use async_trait::async_trait;
use uuid::Uuid;

use super::{DBClient, ReferralExt, StoreError};
use crate::models::referralmodel::{PendingSelector, Referral, ReferralStatus};

const REFERRAL_COLUMNS: &str = r#"
    id, referrer_id, email, date, status, points, subscription_id, completed_at
"#;

#[async_trait]
impl ReferralExt for DBClient {
    async fn create_referral(&self, referral: &Referral) -> Result<Referral, StoreError> {
        let created = sqlx::query_as::<_, Referral>(&format!(
            r#"
            INSERT INTO referrals (id, referrer_id, email, date, status, points)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            REFERRAL_COLUMNS
        ))
        .bind(referral.id)
        .bind(referral.referrer_id)
        .bind(&referral.email)
        .bind(referral.date)
        .bind(referral.status)
        .bind(referral.points)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_referrals(&self, referrer_id: Uuid) -> Result<Vec<Referral>, StoreError> {
        let referrals = sqlx::query_as::<_, Referral>(&format!(
            "SELECT {} FROM referrals WHERE referrer_id = $1 ORDER BY date DESC",
            REFERRAL_COLUMNS
        ))
        .bind(referrer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals)
    }

    async fn complete_pending_referral(
        &self,
        referrer_id: Uuid,
        selector: PendingSelector,
        subscription_id: &str,
        reward: i64,
    ) -> Result<Option<Referral>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // SKIP LOCKED keeps two concurrent completions off the same record
        let pending_id = match selector {
            PendingSelector::Id(referral_id) => {
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    SELECT id FROM referrals
                    WHERE referrer_id = $1 AND id = $2 AND status = $3
                    FOR UPDATE SKIP LOCKED
                    "#,
                )
                .bind(referrer_id)
                .bind(referral_id)
                .bind(ReferralStatus::Pending)
                .fetch_optional(&mut *tx)
                .await?
            }
            PendingSelector::Oldest => {
                sqlx::query_scalar::<_, Uuid>(
                    r#"
                    SELECT id FROM referrals
                    WHERE referrer_id = $1 AND status = $2
                    ORDER BY date ASC, id ASC
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                    "#,
                )
                .bind(referrer_id)
                .bind(ReferralStatus::Pending)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let Some(pending_id) = pending_id else {
            tx.rollback().await?;
            return Ok(None);
        };

        let completed = sqlx::query_as::<_, Referral>(&format!(
            r#"
            UPDATE referrals
            SET status = $2, points = $3, subscription_id = $4, completed_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            REFERRAL_COLUMNS
        ))
        .bind(pending_id)
        .bind(ReferralStatus::Completed)
        .bind(reward)
        .bind(subscription_id)
        .fetch_one(&mut *tx)
        .await?;

        let credited = sqlx::query(
            r#"
            UPDATE users
            SET points = points + $2, referrals = referrals + 1
            WHERE id = $1
            "#,
        )
        .bind(referrer_id)
        .bind(reward)
        .execute(&mut *tx)
        .await?;

        if credited.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(completed))
    }
}
