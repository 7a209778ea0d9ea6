use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    dtos::{WithdrawalOverviewDto, WithdrawalRequestDto, WithdrawalResponseDto},
    error::{ErrorMessage, HttpError},
    models::withdrawalmodels::Withdrawal,
    service::{access::has_required_points, session::Session},
    AppState,
};

pub fn withdrawals_handler() -> Router {
    Router::new().route("/", get(get_withdrawals).post(request_withdrawal))
}

fn withdrawal_response(
    withdrawal: Withdrawal,
    replayed: bool,
) -> (StatusCode, Json<WithdrawalResponseDto>) {
    let status = if replayed { StatusCode::OK } else { StatusCode::CREATED };

    (
        status,
        Json(WithdrawalResponseDto {
            status: "success".to_string(),
            replayed,
            data: withdrawal,
        }),
    )
}

pub async fn get_withdrawals(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, HttpError> {
    let history = app_state
        .withdrawals
        .list_withdrawals(session.user_id())
        .await?;

    Ok(Json(WithdrawalOverviewDto {
        status: "success".to_string(),
        progress: app_state.withdrawals.progress(&session.profile),
        history,
    }))
}

/// Points-gated: the session profile must hold the withdrawal threshold.
/// A retry with a known idempotency key gets the original record back before
/// the gate is consulted, since the first request may have spent the points.
pub async fn request_withdrawal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(body): Json<WithdrawalRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user_id = session.user_id();

    if let Some(withdrawal) = app_state
        .withdrawals
        .find_withdrawal(user_id, &body.idempotency_key)
        .await?
    {
        tracing::info!("Withdrawal {} replayed for {}", withdrawal.id, user_id);
        return Ok(withdrawal_response(withdrawal, true));
    }

    let required_points = app_state.withdrawals.threshold();
    if !has_required_points(&session.profile, required_points) {
        tracing::debug!(
            "Points gate denied {}: {} < {}",
            user_id,
            session.profile.points,
            required_points
        );
        return Err(HttpError::forbidden(
            ErrorMessage::NotEnoughPoints(required_points).to_string(),
        ));
    }

    let (withdrawal, replayed) = app_state
        .withdrawals
        .request_withdrawal(user_id, &body.idempotency_key)
        .await?;

    Ok(withdrawal_response(withdrawal, replayed))
}
