pub mod memory;
pub mod referraldb;
pub mod userdb;
pub mod withdrawaldb;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    referralmodel::{PendingSelector, Referral},
    usermodel::{Identity, Profile, ProfileSettings},
    withdrawalmodels::{Withdrawal, WithdrawalOutcome},
};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Promo code {0} is already taken")]
    DuplicatePromoCode(String),

    #[error("Email {0} is already registered")]
    DuplicateEmail(String),
}

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Name of the unique constraint a database error violated, if any.
pub(crate) fn violated_constraint(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .filter(|db_err| db_err.is_unique_violation())
        .map(|db_err| db_err.constraint().unwrap_or_default().to_string())
}

#[async_trait]
pub trait IdentityExt {
    async fn get_identity(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, StoreError>;

    async fn save_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, StoreError>;
}

#[async_trait]
pub trait ProfileExt {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;

    /// Inserts `profile` unless one already exists for the same id. Returns
    /// the stored profile and whether this call created it.
    async fn create_profile_if_absent(
        &self,
        profile: &Profile,
    ) -> Result<(Profile, bool), StoreError>;

    async fn get_profiles_by_promo_code(
        &self,
        promo_code: &str,
    ) -> Result<Vec<Profile>, StoreError>;

    async fn promo_code_exists(&self, promo_code: &str) -> Result<bool, StoreError>;

    async fn update_profile_settings(
        &self,
        user_id: Uuid,
        settings: &ProfileSettings,
    ) -> Result<Option<Profile>, StoreError>;
}

#[async_trait]
pub trait ReferralExt {
    async fn create_referral(&self, referral: &Referral) -> Result<Referral, StoreError>;

    async fn get_referrals(&self, referrer_id: Uuid) -> Result<Vec<Referral>, StoreError>;

    /// Settles one pending record of `referrer_id` and credits the referrer,
    /// all or nothing. `None` when no pending record matches `selector`.
    async fn complete_pending_referral(
        &self,
        referrer_id: Uuid,
        selector: PendingSelector,
        subscription_id: &str,
        reward: i64,
    ) -> Result<Option<Referral>, StoreError>;
}

#[async_trait]
pub trait WithdrawalExt {
    /// Deducts `points` and records a withdrawal keyed by `idempotency_key`,
    /// all or nothing.
    async fn request_withdrawal(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
        points: i64,
    ) -> Result<WithdrawalOutcome, StoreError>;

    async fn get_withdrawal(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Withdrawal>, StoreError>;

    async fn get_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, StoreError>;
}

pub trait Store:
    IdentityExt + ProfileExt + ReferralExt + WithdrawalExt + Send + Sync + std::fmt::Debug
{
}

impl<T> Store for T where
    T: IdentityExt + ProfileExt + ReferralExt + WithdrawalExt + Send + Sync + std::fmt::Debug
{
}
