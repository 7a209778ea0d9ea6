use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{models::usermodel::Profile, service::withdrawal::PointsProgress};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "Passwords do not match")
    )]
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,

    #[serde(rename = "promoCode", default)]
    pub promo_code: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(length(min = 1, message = "Email is required"), email(message = "Email is invalid"))]
    pub email: String,
    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SettingsUpdateDto {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[serde(rename = "emailNotifications")]
    pub email_notifications: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilterProfileDto {
    pub id: String,
    pub email: String,
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

impl FilterProfileDto {
    pub fn filter_profile(profile: &Profile) -> Self {
        FilterProfileDto {
            id: profile.id.to_string(),
            email: profile.email.to_owned(),
            name: profile.name.clone(),
            email_notifications: profile.email_notifications,
            points: profile.points,
            referrals: profile.referrals,
            withdrawals: profile.withdrawals,
            promo_code: profile.promo_code.to_owned(),
            created_at: profile.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileData {
    pub user: FilterProfileDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponseDto {
    pub status: String,
    pub data: ProfileData,
}

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub user: FilterProfileDto,
    pub progress: PointsProgress,
    #[serde(rename = "rewardPerReferral")]
    pub reward_per_referral: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponseDto {
    pub status: String,
    pub data: DashboardData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponseDto {
    pub status: String,
    pub token: String,
    pub data: ProfileData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_dto_requires_matching_passwords() {
        let dto = RegisterUserDto {
            email: "ada@example.com".to_string(),
            password: "password1".to_string(),
            password_confirm: "password2".to_string(),
            promo_code: None,
        };
        assert!(dto.validate().is_err());

        let dto = RegisterUserDto {
            password_confirm: "password1".to_string(),
            ..dto
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_register_dto_rejects_bad_email_and_short_password() {
        let dto = RegisterUserDto {
            email: "not-an-email".to_string(),
            password: "abc".to_string(),
            password_confirm: "abc".to_string(),
            promo_code: None,
        };
        let errors = dto.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
