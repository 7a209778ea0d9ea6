use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use subtle::ConstantTimeEq;

use crate::{
    error::{ErrorMessage, HttpError},
    AppState,
};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Resolves the session token (cookie or bearer header) to a [`crate::service::session::Session`],
/// provisioning the profile on first sign-in, and stores it in the request.
pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer ").map(str::to_owned))
        });

    let token = token.ok_or_else(|| {
        HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string())
    })?;

    let identity = app_state.identity.resolve(&token).await?;
    let session = app_state.sessions.ensure_profile(identity).await?;

    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

/// Guards server-to-server routes with the shared webhook secret.
pub async fn webhook_auth(
    Extension(app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let provided = req
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();

    let expected = app_state.env.webhook_secret.as_bytes();
    if expected.is_empty() || !bool::from(provided.ct_eq(expected)) {
        return Err(HttpError::unauthorized(ErrorMessage::PermissionDenied.to_string()));
    }

    Ok(next.run(req).await)
}
