use async_trait::async_trait;
use uuid::Uuid;

use super::{violated_constraint, DBClient, IdentityExt, ProfileExt, StoreError};
use crate::models::usermodel::{Identity, Profile, ProfileSettings};

const PROFILE_COLUMNS: &str = r#"
    id, email, name, email_notifications, points, referrals, withdrawals,
    promo_code, created_at
"#;

#[async_trait]
impl IdentityExt for DBClient {
    async fn get_identity(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, StoreError> {
        let mut identity: Option<Identity> = None;

        if let Some(user_id) = user_id {
            identity = sqlx::query_as::<_, Identity>(
                "SELECT id, email, password, created_at FROM identities WHERE id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            identity = sqlx::query_as::<_, Identity>(
                "SELECT id, email, password, created_at FROM identities WHERE email = $1",
            )
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(identity)
    }

    async fn save_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, StoreError> {
        let email = email.to_lowercase();

        sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO identities (id, email, password)
            VALUES ($1, $2, $3)
            RETURNING id, email, password, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(password)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match violated_constraint(&err) {
            Some(_) => StoreError::DuplicateEmail(email.clone()),
            None => StoreError::Database(err),
        })
    }
}

#[async_trait]
impl ProfileExt for DBClient {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn create_profile_if_absent(
        &self,
        profile: &Profile,
    ) -> Result<(Profile, bool), StoreError> {
        let inserted = sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO users
                (id, email, name, email_notifications, points, referrals, withdrawals, promo_code, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(profile.email_notifications)
        .bind(profile.points)
        .bind(profile.referrals)
        .bind(profile.withdrawals)
        .bind(&profile.promo_code)
        .bind(profile.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| match violated_constraint(&err) {
            Some(_) => StoreError::DuplicatePromoCode(profile.promo_code.clone()),
            None => StoreError::Database(err),
        })?;

        match inserted {
            Some(created) => Ok((created, true)),
            None => {
                // Lost the race to another first sign-in; keep what is stored.
                let existing = self.get_profile(profile.id).await?.ok_or_else(|| {
                    StoreError::Unavailable(format!("profile {} vanished after conflict", profile.id))
                })?;
                Ok((existing, false))
            }
        }
    }

    async fn get_profiles_by_promo_code(
        &self,
        promo_code: &str,
    ) -> Result<Vec<Profile>, StoreError> {
        let profiles = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {} FROM users WHERE promo_code = $1 LIMIT 2",
            PROFILE_COLUMNS
        ))
        .bind(promo_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn promo_code_exists(&self, promo_code: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE promo_code = $1)",
        )
        .bind(promo_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn update_profile_settings(
        &self,
        user_id: Uuid,
        settings: &ProfileSettings,
    ) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email_notifications = COALESCE($3, email_notifications)
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .bind(&settings.name)
        .bind(settings.email_notifications)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}
