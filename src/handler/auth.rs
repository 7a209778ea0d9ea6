use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response as AxumResponse},
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use validator::Validate;

use crate::{
    dtos::{
        FilterProfileDto, LoginUserDto, ProfileData, RegisterResponseDto, RegisterUserDto,
        Response, UserLoginResponseDto,
    },
    error::HttpError,
    service::{error::ServiceError, ledger::PromoCodeValidation},
    AppState,
};

pub fn auth_handler() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

fn session_cookie(token: String, max_age: time::Duration) -> Result<HeaderValue, HttpError> {
    let cookie = Cookie::build(("token", token))
        .path("/")
        .max_age(max_age)
        .http_only(true)
        .build();

    cookie
        .to_string()
        .parse()
        .map_err(|_| HttpError::server_error("Failed to build session cookie"))
}

fn with_cookie(response: impl IntoResponse, cookie: HeaderValue) -> AxumResponse {
    let mut response = response.into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie);
    response
}

pub async fn register(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let email = body.email.trim().to_lowercase();

    // The promo code is checked before anything is written
    let mut referrer_id = None;
    if let Some(code) = body.promo_code.as_deref().filter(|c| !c.trim().is_empty()) {
        match app_state.ledger.validate_promo_code(code).await? {
            PromoCodeValidation::Valid { referrer_id: id, referrer } => {
                if referrer.email == email {
                    return Err(ServiceError::SelfReferral.into());
                }
                referrer_id = Some(id);
            }
            PromoCodeValidation::Invalid => {
                return Err(ServiceError::InvalidPromoCode(code.trim().to_string()).into());
            }
        }
    }

    let identity = app_state.identity.register(&email, &body.password).await?;
    let session = app_state.sessions.ensure_profile(identity).await?;

    if let Some(referrer_id) = referrer_id {
        // The account exists either way; a failed tracking write is only logged
        if let Err(e) = app_state.ledger.track_referral(referrer_id, &email).await {
            tracing::error!("Failed to track referral of {} by {}: {}", email, referrer_id, e);
        }
    }

    let token = app_state.identity.issue_token(&session.identity)?;
    let cookie = session_cookie(
        token.clone(),
        time::Duration::minutes(app_state.identity.session_maxage()),
    )?;

    let response = (
        StatusCode::CREATED,
        Json(RegisterResponseDto {
            status: "success".to_string(),
            token,
            data: ProfileData {
                user: FilterProfileDto::filter_profile(&session.profile),
            },
        }),
    );

    Ok(with_cookie(response, cookie))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (identity, token) = app_state.identity.login(&body.email, &body.password).await?;

    // First sign-in after an out-of-band registration provisions the profile
    app_state.sessions.ensure_profile(identity).await?;

    let cookie = session_cookie(
        token.clone(),
        time::Duration::minutes(app_state.identity.session_maxage()),
    )?;

    let response = Json(UserLoginResponseDto {
        status: "success".to_string(),
        token,
    });

    Ok(with_cookie(response, cookie))
}

pub async fn logout() -> Result<impl IntoResponse, HttpError> {
    let cookie = session_cookie(String::new(), time::Duration::ZERO)?;

    let response = Json(Response {
        status: "success",
        message: "Logged out".to_string(),
    });

    Ok(with_cookie(response, cookie))
}
