use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{Store, StoreError},
    models::usermodel::{Identity, Profile, ProfileSettings},
};

use super::{
    error::ServiceError,
    promo::{generate_unique_promo_code, MAX_PROMO_CODE_ATTEMPTS},
};

/// Identity and profile resolved for one authenticated request.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub identity: Identity,
    pub profile: Profile,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }
}

#[derive(Debug)]
pub struct SessionService {
    store: Arc<dyn Store>,
}

impl SessionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Loads the profile for `identity`, provisioning it on first sign-in.
    /// An existing profile is never overwritten.
    pub async fn ensure_profile(&self, identity: Identity) -> Result<Session, ServiceError> {
        if let Some(profile) = self.store.get_profile(identity.id).await? {
            return Ok(Session { identity, profile });
        }

        for _ in 0..MAX_PROMO_CODE_ATTEMPTS {
            let promo_code = generate_unique_promo_code(self.store.as_ref()).await?;
            let candidate = Profile::provision(&identity, promo_code);

            match self.store.create_profile_if_absent(&candidate).await {
                Ok((profile, created)) => {
                    if created {
                        tracing::info!(
                            "Provisioned profile for {} with promo code {}",
                            identity.email,
                            profile.promo_code
                        );
                    }
                    return Ok(Session { identity, profile });
                }
                // Another profile took the code between the check and the insert
                Err(StoreError::DuplicatePromoCode(code)) => {
                    tracing::debug!("Promo code {} taken during provisioning, retrying", code);
                }
                Err(e) => {
                    tracing::error!("Error provisioning profile for {}: {}", identity.id, e);
                    return Err(e.into());
                }
            }
        }

        Err(ServiceError::PromoCodeExhausted(MAX_PROMO_CODE_ATTEMPTS))
    }

    pub async fn refresh(&self, session: &Session) -> Result<Session, ServiceError> {
        let profile = self
            .store
            .get_profile(session.user_id())
            .await?
            .ok_or(ServiceError::ProfileNotFound(session.user_id()))?;

        Ok(Session {
            identity: session.identity.clone(),
            profile,
        })
    }

    pub async fn update_settings(
        &self,
        user_id: Uuid,
        settings: ProfileSettings,
    ) -> Result<Profile, ServiceError> {
        self.store
            .update_profile_settings(user_id, &settings)
            .await?
            .ok_or(ServiceError::ProfileNotFound(user_id))
    }
}
