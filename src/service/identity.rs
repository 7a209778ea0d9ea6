use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{Store, StoreError},
    error::ErrorMessage,
    models::usermodel::Identity,
    utils::{password, token},
};

use super::error::ServiceError;

/// Email/password accounts and the session tokens issued for them.
#[derive(Debug)]
pub struct IdentityProvider {
    store: Arc<dyn Store>,
    jwt_secret: String,
    jwt_maxage: i64,
}

impl IdentityProvider {
    pub fn new(store: Arc<dyn Store>, jwt_secret: String, jwt_maxage: i64) -> Self {
        Self {
            store,
            jwt_secret,
            jwt_maxage,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Identity, ServiceError> {
        let email = email.trim().to_lowercase();

        if self.store.get_identity(None, Some(email.as_str())).await?.is_some() {
            return Err(ServiceError::EmailTaken(email));
        }

        let hashed_password = password::hash(password)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        match self.store.save_identity(&email, &hashed_password).await {
            Ok(identity) => {
                tracing::info!("Registered identity {} ({})", identity.id, identity.email);
                Ok(identity)
            }
            Err(StoreError::DuplicateEmail(email)) => Err(ServiceError::EmailTaken(email)),
            Err(e) => Err(e.into()),
        }
    }

    /// Verifies credentials and issues a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(Identity, String), ServiceError> {
        let identity = self
            .store
            .get_identity(None, Some(email.trim().to_lowercase().as_str()))
            .await?
            .ok_or(ServiceError::WrongCredentials)?;

        let password_matched = password::compare(password, &identity.password)
            .map_err(|_| ServiceError::WrongCredentials)?;
        if !password_matched {
            return Err(ServiceError::WrongCredentials);
        }

        let token = self.issue_token(&identity)?;
        Ok((identity, token))
    }

    pub fn issue_token(&self, identity: &Identity) -> Result<String, ServiceError> {
        token::create_token(
            &identity.id.to_string(),
            self.jwt_secret.as_bytes(),
            self.jwt_maxage,
        )
        .map_err(|e| ServiceError::InvalidSession(e.to_string()))
    }

    /// Resolves a session token to the identity it was issued for.
    pub async fn resolve(&self, session_token: &str) -> Result<Identity, ServiceError> {
        let subject = token::decode_token(session_token, self.jwt_secret.as_bytes())
            .map_err(|_| ServiceError::InvalidSession(ErrorMessage::InvalidToken.to_string()))?;

        let user_id = Uuid::parse_str(&subject)
            .map_err(|_| ServiceError::InvalidSession(ErrorMessage::InvalidToken.to_string()))?;

        self.store
            .get_identity(Some(user_id), None)
            .await?
            .ok_or_else(|| ServiceError::InvalidSession(ErrorMessage::UserNoLongerExist.to_string()))
    }

    pub fn session_maxage(&self) -> i64 {
        self.jwt_maxage
    }
}
