use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{IdentityExt, ProfileExt, ReferralExt, StoreError, WithdrawalExt};
use crate::models::{
    referralmodel::{PendingSelector, Referral, ReferralStatus},
    usermodel::{Identity, Profile, ProfileSettings},
    withdrawalmodels::{Withdrawal, WithdrawalOutcome, WithdrawalStatus},
};

#[derive(Debug, Default)]
struct MemoryState {
    identities: HashMap<Uuid, Identity>,
    profiles: HashMap<Uuid, Profile>,
    referrals: HashMap<Uuid, Referral>,
    withdrawals: Vec<Withdrawal>,
}

/// Process-local store with the same contract as [`super::DBClient`].
/// Every compound mutation runs under a single write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail as if the backing service were unreachable.
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityExt for MemoryStore {
    async fn get_identity(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;

        if let Some(user_id) = user_id {
            return Ok(state.identities.get(&user_id).cloned());
        }
        if let Some(email) = email {
            let email = email.to_lowercase();
            return Ok(state.identities.values().find(|i| i.email == email).cloned());
        }
        Ok(None)
    }

    async fn save_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let email = email.to_lowercase();

        if state.identities.values().any(|i| i.email == email) {
            return Err(StoreError::DuplicateEmail(email));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email,
            password: password.to_string(),
            created_at: Utc::now(),
        };
        state.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }
}

#[async_trait]
impl ProfileExt for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.profiles.get(&user_id).cloned())
    }

    async fn create_profile_if_absent(
        &self,
        profile: &Profile,
    ) -> Result<(Profile, bool), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if let Some(existing) = state.profiles.get(&profile.id) {
            return Ok((existing.clone(), false));
        }
        if state.profiles.values().any(|p| p.promo_code == profile.promo_code) {
            return Err(StoreError::DuplicatePromoCode(profile.promo_code.clone()));
        }

        state.profiles.insert(profile.id, profile.clone());
        Ok((profile.clone(), true))
    }

    async fn get_profiles_by_promo_code(
        &self,
        promo_code: &str,
    ) -> Result<Vec<Profile>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .profiles
            .values()
            .filter(|p| p.promo_code == promo_code)
            .cloned()
            .collect())
    }

    async fn promo_code_exists(&self, promo_code: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.profiles.values().any(|p| p.promo_code == promo_code))
    }

    async fn update_profile_settings(
        &self,
        user_id: Uuid,
        settings: &ProfileSettings,
    ) -> Result<Option<Profile>, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let Some(profile) = state.profiles.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(name) = &settings.name {
            profile.name = Some(name.clone());
        }
        if let Some(email_notifications) = settings.email_notifications {
            profile.email_notifications = email_notifications;
        }
        Ok(Some(profile.clone()))
    }
}

#[async_trait]
impl ReferralExt for MemoryStore {
    async fn create_referral(&self, referral: &Referral) -> Result<Referral, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        state.referrals.insert(referral.id, referral.clone());
        Ok(referral.clone())
    }

    async fn get_referrals(&self, referrer_id: Uuid) -> Result<Vec<Referral>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .referrals
            .values()
            .filter(|r| r.referrer_id == referrer_id)
            .cloned()
            .collect())
    }

    async fn complete_pending_referral(
        &self,
        referrer_id: Uuid,
        selector: PendingSelector,
        subscription_id: &str,
        reward: i64,
    ) -> Result<Option<Referral>, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if !state.profiles.contains_key(&referrer_id) {
            return Ok(None);
        }

        let mut pending = state.referrals.values().filter(|r| {
            r.referrer_id == referrer_id && r.status == ReferralStatus::Pending
        });
        let pending_id = match selector {
            PendingSelector::Id(id) => pending.find(|r| r.id == id).map(|r| r.id),
            PendingSelector::Oldest => pending
                .min_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)))
                .map(|r| r.id),
        };
        let Some(pending_id) = pending_id else {
            return Ok(None);
        };

        let completed = match state.referrals.get_mut(&pending_id) {
            Some(referral) => {
                referral.status = ReferralStatus::Completed;
                referral.points = reward;
                referral.subscription_id = Some(subscription_id.to_string());
                referral.completed_at = Some(Utc::now());
                referral.clone()
            }
            None => return Ok(None),
        };

        if let Some(profile) = state.profiles.get_mut(&referrer_id) {
            profile.points += reward;
            profile.referrals += 1;
        }

        Ok(Some(completed))
    }
}

#[async_trait]
impl WithdrawalExt for MemoryStore {
    async fn request_withdrawal(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
        points: i64,
    ) -> Result<WithdrawalOutcome, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let Some(available) = state.profiles.get(&user_id).map(|p| p.points) else {
            return Ok(WithdrawalOutcome::ProfileMissing);
        };

        if let Some(existing) = state
            .withdrawals
            .iter()
            .find(|w| w.user_id == user_id && w.idempotency_key == idempotency_key)
        {
            return Ok(WithdrawalOutcome::Replayed(existing.clone()));
        }

        if available < points {
            return Ok(WithdrawalOutcome::InsufficientPoints { available });
        }

        if let Some(profile) = state.profiles.get_mut(&user_id) {
            profile.points -= points;
            profile.withdrawals += 1;
        }

        let withdrawal = Withdrawal {
            id: Uuid::new_v4(),
            user_id,
            points,
            idempotency_key: idempotency_key.to_string(),
            status: WithdrawalStatus::Requested,
            created_at: Utc::now(),
        };
        state.withdrawals.push(withdrawal.clone());

        Ok(WithdrawalOutcome::Created(withdrawal))
    }

    async fn get_withdrawal(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Withdrawal>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;

        Ok(state
            .withdrawals
            .iter()
            .find(|w| w.user_id == user_id && w.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn get_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;

        let mut withdrawals: Vec<Withdrawal> = state
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(withdrawals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store.save_identity("Ada@Example.com", "hash").await.unwrap();

        let err = store.save_identity("ada@example.com", "hash").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_duplicate_promo_code_rejected() {
        let store = MemoryStore::new();
        let first = Profile::provision(&identity("a@example.com"), "ABCD23".to_string());
        let second = Profile::provision(&identity("b@example.com"), "ABCD23".to_string());

        store.create_profile_if_absent(&first).await.unwrap();
        let err = store.create_profile_if_absent(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePromoCode(code) if code == "ABCD23"));
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let err = store.get_profile(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
