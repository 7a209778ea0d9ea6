use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    db::Store,
    models::{
        referralmodel::{PendingSelector, Referral, ReferralSummary},
        usermodel::Profile,
    },
};

use super::{error::ServiceError, feed::ReferralFeed, promo::normalize_promo_code};

#[derive(Debug, Clone, PartialEq)]
pub enum PromoCodeValidation {
    Valid { referrer_id: Uuid, referrer: Profile },
    Invalid,
}

/// Referral records and the point/referral counters they drive.
#[derive(Debug)]
pub struct ReferralLedger {
    store: Arc<dyn Store>,
    feed: Arc<ReferralFeed>,
    reward_points: i64,
}

impl ReferralLedger {
    pub fn new(store: Arc<dyn Store>, feed: Arc<ReferralFeed>, reward_points: i64) -> Self {
        Self {
            store,
            feed,
            reward_points,
        }
    }

    pub fn reward_points(&self) -> i64 {
        self.reward_points
    }

    /// Records a pending referral of `referred_email` under `referrer_id`.
    /// The same email may be tracked more than once.
    pub async fn track_referral(
        &self,
        referrer_id: Uuid,
        referred_email: &str,
    ) -> Result<Referral, ServiceError> {
        let email = referred_email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ServiceError::Validation("Referred email is required".to_string()));
        }

        if self.store.get_profile(referrer_id).await?.is_none() {
            return Err(ServiceError::ProfileNotFound(referrer_id));
        }

        let referral = self
            .store
            .create_referral(&Referral::pending(referrer_id, email))
            .await
            .map_err(|e| {
                tracing::error!("Error tracking referral for {}: {}", referrer_id, e);
                e
            })?;

        tracing::info!("Tracked pending referral {} for referrer {}", referral.id, referrer_id);
        self.republish(referrer_id).await;

        Ok(referral)
    }

    /// Settles a pending referral and credits the referrer. With no
    /// `referral_id` the oldest pending record is chosen. `None` means no
    /// matching pending record, in which case nothing changed.
    pub async fn complete_referral(
        &self,
        referrer_id: Uuid,
        referral_id: Option<Uuid>,
        subscription_id: &str,
    ) -> Result<Option<Referral>, ServiceError> {
        let subscription_id = subscription_id.trim();
        if subscription_id.is_empty() {
            return Err(ServiceError::Validation("Subscription id is required".to_string()));
        }

        let completed = self
            .store
            .complete_pending_referral(
                referrer_id,
                PendingSelector::from(referral_id),
                subscription_id,
                self.reward_points,
            )
            .await
            .map_err(|e| {
                tracing::error!("Error completing referral for {}: {}", referrer_id, e);
                e
            })?;

        match &completed {
            Some(referral) => {
                tracing::info!(
                    "Referral {} completed: referrer {} +{} points (subscription {})",
                    referral.id,
                    referrer_id,
                    self.reward_points,
                    subscription_id
                );
                self.republish(referrer_id).await;
            }
            None => tracing::warn!("No pending referral to complete for {}", referrer_id),
        }

        Ok(completed)
    }

    pub async fn validate_promo_code(&self, code: &str) -> Result<PromoCodeValidation, ServiceError> {
        let code = normalize_promo_code(code);
        if code.is_empty() {
            return Ok(PromoCodeValidation::Invalid);
        }

        let mut matches = self.store.get_profiles_by_promo_code(&code).await?;

        match matches.len() {
            1 => {
                let referrer = matches.remove(0);
                Ok(PromoCodeValidation::Valid {
                    referrer_id: referrer.id,
                    referrer,
                })
            }
            0 => Ok(PromoCodeValidation::Invalid),
            n => {
                tracing::warn!("Promo code {} is shared by {} profiles; rejecting", code, n);
                Ok(PromoCodeValidation::Invalid)
            }
        }
    }

    pub async fn get_user_promo_code(&self, user_id: Uuid) -> Result<Option<String>, ServiceError> {
        let profile = self.store.get_profile(user_id).await?;
        Ok(profile.map(|p| p.promo_code))
    }

    pub async fn list_referrals(&self, user_id: Uuid) -> Result<ReferralSummary, ServiceError> {
        let referrals = self.store.get_referrals(user_id).await?;
        Ok(ReferralSummary::from_records(referrals))
    }

    /// Live view of `user_id`'s referrals, primed with the current records.
    pub async fn subscribe(
        &self,
        user_id: Uuid,
    ) -> Result<watch::Receiver<ReferralSummary>, ServiceError> {
        let receiver = self.feed.subscribe(user_id);
        let version = self.feed.next_version();
        let summary = self.list_referrals(user_id).await?;
        self.feed.publish(user_id, version, summary);
        Ok(receiver)
    }

    async fn republish(&self, user_id: Uuid) {
        if self.feed.subscriber_count(user_id) == 0 {
            self.feed.prune(user_id);
            return;
        }

        // Versioned before the read so a slower, older read cannot win
        let version = self.feed.next_version();
        match self.list_referrals(user_id).await {
            Ok(summary) => self.feed.publish(user_id, version, summary),
            Err(e) => tracing::error!("Error refreshing referral feed for {}: {}", user_id, e),
        }
    }
}
