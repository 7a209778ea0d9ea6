use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    dtos::{
        DashboardData, DashboardResponseDto, FilterProfileDto, ProfileData, ProfileResponseDto,
        PromoCodeResponseDto, SettingsUpdateDto,
    },
    error::HttpError,
    models::usermodel::ProfileSettings,
    service::{promo::generate_referral_link, session::Session},
    AppState,
};

pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/refresh", post(refresh_me))
        .route("/settings", put(update_settings))
        .route("/promo-code", get(get_promo_code))
}

pub async fn get_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, HttpError> {
    let response = DashboardResponseDto {
        status: "success".to_string(),
        data: DashboardData {
            user: FilterProfileDto::filter_profile(&session.profile),
            progress: app_state.withdrawals.progress(&session.profile),
            reward_per_referral: app_state.ledger.reward_points(),
        },
    };

    Ok(Json(response))
}

pub async fn refresh_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, HttpError> {
    let session = app_state.sessions.refresh(&session).await?;

    Ok(Json(ProfileResponseDto {
        status: "success".to_string(),
        data: ProfileData {
            user: FilterProfileDto::filter_profile(&session.profile),
        },
    }))
}

pub async fn update_settings(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(body): Json<SettingsUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let profile = app_state
        .sessions
        .update_settings(
            session.user_id(),
            ProfileSettings {
                name: body.name.map(|name| name.trim().to_string()),
                email_notifications: body.email_notifications,
            },
        )
        .await?;

    Ok(Json(ProfileResponseDto {
        status: "success".to_string(),
        data: ProfileData {
            user: FilterProfileDto::filter_profile(&profile),
        },
    }))
}

pub async fn get_promo_code(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, HttpError> {
    let promo_code = app_state
        .ledger
        .get_user_promo_code(session.user_id())
        .await?
        .ok_or_else(|| HttpError::not_found("No promo code found"))?;

    let referral_link = generate_referral_link(&app_state.env.app_url, &promo_code);

    Ok(Json(PromoCodeResponseDto {
        status: "success".to_string(),
        promo_code,
        referral_link,
    }))
}
