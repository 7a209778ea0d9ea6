use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Store,
    models::{
        usermodel::Profile,
        withdrawalmodels::{Withdrawal, WithdrawalOutcome},
    },
};

use super::error::ServiceError;

/// Where a profile stands against the withdrawal threshold.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PointsProgress {
    pub points: i64,
    pub threshold: i64,
    #[serde(rename = "pointsNeeded")]
    pub points_needed: i64,
    /// Percentage of the threshold reached, capped at 100.
    pub progress: f64,
    pub eligible: bool,
    pub withdrawals: i64,
}

impl PointsProgress {
    pub fn new(profile: &Profile, threshold: i64) -> Self {
        let progress = if threshold > 0 {
            (profile.points as f64 / threshold as f64 * 100.0).min(100.0)
        } else {
            100.0
        };

        PointsProgress {
            points: profile.points,
            threshold,
            points_needed: (threshold - profile.points).max(0),
            progress,
            eligible: profile.points >= threshold,
            withdrawals: profile.withdrawals,
        }
    }
}

#[derive(Debug)]
pub struct WithdrawalService {
    store: Arc<dyn Store>,
    threshold: i64,
}

impl WithdrawalService {
    pub fn new(store: Arc<dyn Store>, threshold: i64) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn progress(&self, profile: &Profile) -> PointsProgress {
        PointsProgress::new(profile, self.threshold)
    }

    /// Converts one threshold's worth of points into a withdrawal. Replaying
    /// an `idempotency_key` returns the original withdrawal without deducting
    /// again; the flag is `true` in that case.
    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<(Withdrawal, bool), ServiceError> {
        let idempotency_key = checked_key(idempotency_key)?;
        if self.threshold <= 0 {
            return Err(ServiceError::Validation("Withdrawals are disabled".to_string()));
        }

        let outcome = self
            .store
            .request_withdrawal(user_id, idempotency_key, self.threshold)
            .await
            .map_err(|e| {
                tracing::error!("Error requesting withdrawal for {}: {}", user_id, e);
                e
            })?;

        match outcome {
            WithdrawalOutcome::Created(withdrawal) => {
                tracing::info!(
                    "Withdrawal {} created for {}: -{} points",
                    withdrawal.id,
                    user_id,
                    withdrawal.points
                );
                Ok((withdrawal, false))
            }
            WithdrawalOutcome::Replayed(withdrawal) => {
                tracing::info!("Withdrawal {} replayed for {}", withdrawal.id, user_id);
                Ok((withdrawal, true))
            }
            WithdrawalOutcome::InsufficientPoints { available } => {
                Err(ServiceError::InsufficientPoints {
                    required: self.threshold,
                    available,
                })
            }
            WithdrawalOutcome::ProfileMissing => Err(ServiceError::ProfileNotFound(user_id)),
        }
    }

    /// The withdrawal already recorded under `idempotency_key`, if any.
    pub async fn find_withdrawal(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Withdrawal>, ServiceError> {
        let idempotency_key = checked_key(idempotency_key)?;
        Ok(self.store.get_withdrawal(user_id, idempotency_key).await?)
    }

    pub async fn list_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, ServiceError> {
        Ok(self.store.get_withdrawals(user_id).await?)
    }
}

fn checked_key(idempotency_key: &str) -> Result<&str, ServiceError> {
    let idempotency_key = idempotency_key.trim();
    if idempotency_key.is_empty() || idempotency_key.len() > 128 {
        return Err(ServiceError::Validation(
            "Idempotency key must be between 1 and 128 characters".to_string(),
        ));
    }
    Ok(idempotency_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{IdentityExt, MemoryStore, ProfileExt, ReferralExt},
        models::referralmodel::{PendingSelector, Referral},
    };

    const THRESHOLD: i64 = 4;

    /// Profile with `completions` completed referrals worth 2 points each.
    async fn earner(store: &MemoryStore, completions: usize) -> Profile {
        let identity = store.save_identity("earner@example.com", "hash").await.unwrap();
        let (profile, _) = store
            .create_profile_if_absent(&Profile::provision(&identity, "EARN23".to_string()))
            .await
            .unwrap();

        for i in 0..completions {
            store
                .create_referral(&Referral::pending(profile.id, format!("f{}@example.com", i)))
                .await
                .unwrap();
            store
                .complete_pending_referral(profile.id, PendingSelector::Oldest, "sub", 2)
                .await
                .unwrap();
        }

        store.get_profile(profile.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_below_threshold_is_rejected_without_changes() {
        let store = Arc::new(MemoryStore::new());
        let service = WithdrawalService::new(store.clone(), THRESHOLD);
        let profile = earner(&store, 1).await;

        let err = service.request_withdrawal(profile.id, "key-1").await.unwrap_err();

        assert!(matches!(err, ServiceError::InsufficientPoints { required: 4, available: 2 }));
        let after = store.get_profile(profile.id).await.unwrap().unwrap();
        assert_eq!((after.points, after.withdrawals), (2, 0));
        assert!(service.list_withdrawals(profile.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_at_threshold_deducts_and_counts() {
        let store = Arc::new(MemoryStore::new());
        let service = WithdrawalService::new(store.clone(), THRESHOLD);
        let profile = earner(&store, 3).await;

        let (withdrawal, replayed) = service.request_withdrawal(profile.id, "key-1").await.unwrap();

        assert!(!replayed);
        assert_eq!(withdrawal.points, THRESHOLD);
        let after = store.get_profile(profile.id).await.unwrap().unwrap();
        assert_eq!((after.points, after.withdrawals), (2, 1));
    }

    #[tokio::test]
    async fn test_replayed_key_does_not_deduct_twice() {
        let store = Arc::new(MemoryStore::new());
        let service = WithdrawalService::new(store.clone(), THRESHOLD);
        let profile = earner(&store, 4).await;

        let (first, _) = service.request_withdrawal(profile.id, "key-1").await.unwrap();
        let (second, replayed) = service.request_withdrawal(profile.id, "key-1").await.unwrap();

        assert!(replayed);
        assert_eq!(first.id, second.id);
        let after = store.get_profile(profile.id).await.unwrap().unwrap();
        assert_eq!((after.points, after.withdrawals), (4, 1));
        assert_eq!(service.list_withdrawals(profile.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_withdrawal_after_balance_drops() {
        let store = Arc::new(MemoryStore::new());
        let service = WithdrawalService::new(store.clone(), THRESHOLD);
        let profile = earner(&store, 2).await;

        let (created, _) = service.request_withdrawal(profile.id, "key-1").await.unwrap();

        let found = service.find_withdrawal(profile.id, " key-1 ").await.unwrap();
        assert_eq!(found, Some(created));
        assert_eq!(service.find_withdrawal(profile.id, "key-2").await.unwrap(), None);
        assert_eq!(service.find_withdrawal(Uuid::new_v4(), "key-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_key_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = WithdrawalService::new(store, THRESHOLD);

        let err = service.request_withdrawal(Uuid::new_v4(), "  ").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_profile() {
        let store = Arc::new(MemoryStore::new());
        let service = WithdrawalService::new(store, THRESHOLD);

        let err = service.request_withdrawal(Uuid::new_v4(), "key-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn test_progress() {
        let store = Arc::new(MemoryStore::new());
        let service = WithdrawalService::new(store.clone(), THRESHOLD);
        let profile = earner(&store, 1).await;

        let progress = service.progress(&profile);
        assert_eq!(progress.points_needed, 2);
        assert_eq!(progress.progress, 50.0);
        assert!(!progress.eligible);
    }
}
