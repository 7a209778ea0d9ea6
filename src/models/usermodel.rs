use chrono::prelude::*;
use serde::{Deserialize, Serialize};

/// Account known to the identity provider. Holds credentials only; the
/// rewards state lives in [`Profile`].
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Identity {
    pub id: uuid::Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Profile {
    pub id: uuid::Uuid,
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "emailNotifications")]
    pub email_notifications: bool,

    pub points: i64,
    pub referrals: i64,
    pub withdrawals: i64,

    #[serde(rename = "promoCode")]
    pub promo_code: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Fresh profile for a first sign-in: zeroed counters, given promo code.
    pub fn provision(identity: &Identity, promo_code: String) -> Self {
        Profile {
            id: identity.id,
            email: identity.email.clone(),
            name: None,
            email_notifications: true,
            points: 0,
            referrals: 0,
            withdrawals: 0,
            promo_code,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProfileSettings {
    pub name: Option<String>,
    pub email_notifications: Option<bool>,
}
