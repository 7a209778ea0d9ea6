use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    referralmodel::{Referral, ReferralSummary},
    withdrawalmodels::Withdrawal,
};
use crate::service::withdrawal::PointsProgress;

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct TrackReferralDto {
    #[serde(rename = "referrerId")]
    pub referrer_id: Uuid,

    #[validate(
        length(min = 1, message = "Referred email is required"),
        email(message = "Referred email is invalid")
    )]
    pub email: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CompleteReferralDto {
    #[serde(rename = "referrerId")]
    pub referrer_id: Uuid,

    /// Settles this record; the oldest pending one when absent.
    #[serde(rename = "referralId", default)]
    pub referral_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255, message = "Subscription id is required"))]
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct PromoCodeQueryDto {
    #[validate(length(min = 1, max = 32, message = "Promo code is required"))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct PromoCodeValidationDto {
    pub valid: bool,
    #[serde(rename = "referrerId", skip_serializing_if = "Option::is_none")]
    pub referrer_id: Option<String>,
    #[serde(rename = "referrerEmail", skip_serializing_if = "Option::is_none")]
    pub referrer_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PromoCodeResponseDto {
    pub status: String,
    #[serde(rename = "promoCode")]
    pub promo_code: String,
    #[serde(rename = "referralLink")]
    pub referral_link: String,
}

#[derive(Debug, Serialize)]
pub struct ReferralResponseDto {
    pub status: String,
    pub data: Referral,
}

#[derive(Debug, Serialize)]
pub struct ReferralListResponseDto {
    pub status: String,
    pub data: ReferralSummary,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequestDto {
    #[validate(length(min = 1, max = 128, message = "Idempotency key must be between 1 and 128 characters"))]
    #[serde(rename = "idempotencyKey")]
    pub idempotency_key: String,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalResponseDto {
    pub status: String,
    pub replayed: bool,
    pub data: Withdrawal,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalOverviewDto {
    pub status: String,
    pub progress: PointsProgress,
    pub history: Vec<Withdrawal>,
}
