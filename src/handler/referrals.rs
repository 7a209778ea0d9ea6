use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::Query,
    http::StatusCode,
    middleware,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use futures::stream::{self, Stream};
use validator::Validate;

use crate::{
    dtos::{
        CompleteReferralDto, PromoCodeQueryDto, PromoCodeValidationDto, ReferralListResponseDto,
        ReferralResponseDto, TrackReferralDto,
    },
    error::HttpError,
    middleware::{auth, webhook_auth},
    service::{ledger::PromoCodeValidation, session::Session},
    AppState,
};

pub fn referrals_handler() -> Router {
    let member_routes = Router::new()
        .route("/", get(list_referrals))
        .route("/stream", get(stream_referrals))
        .layer(middleware::from_fn(auth));

    let webhook_routes = Router::new()
        .route("/track", post(track_referral))
        .route("/complete", post(complete_referral))
        .layer(middleware::from_fn(webhook_auth));

    Router::new()
        .route("/validate", get(validate_promo_code))
        .merge(member_routes)
        .merge(webhook_routes)
}

pub async fn list_referrals(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, HttpError> {
    let summary = app_state.ledger.list_referrals(session.user_id()).await?;

    Ok(Json(ReferralListResponseDto {
        status: "success".to_string(),
        data: summary,
    }))
}

/// Pushes the referral list on connect and after every change. Closing the
/// connection drops the subscription.
pub async fn stream_referrals(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HttpError> {
    let user_id = session.user_id();
    let receiver = app_state.ledger.subscribe(user_id).await?;
    tracing::debug!(
        "Referral stream opened for {} ({} subscribers, {} open feeds)",
        user_id,
        app_state.feed.subscriber_count(user_id),
        app_state.feed.channel_count()
    );

    let events = stream::unfold((receiver, true), |(mut receiver, first)| async move {
        if !first && receiver.changed().await.is_err() {
            return None;
        }

        let summary = receiver.borrow_and_update().clone();
        let event = match Event::default().event("referrals").json_data(&summary) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Failed to encode referral snapshot: {}", e);
                Event::default().event("error").data("snapshot unavailable")
            }
        };

        Some((Ok(event), (receiver, false)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn validate_promo_code(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query_params): Query<PromoCodeQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let response = match app_state.ledger.validate_promo_code(&query_params.code).await? {
        PromoCodeValidation::Valid { referrer_id, referrer } => PromoCodeValidationDto {
            valid: true,
            referrer_id: Some(referrer_id.to_string()),
            referrer_email: Some(referrer.email),
        },
        PromoCodeValidation::Invalid => PromoCodeValidationDto {
            valid: false,
            referrer_id: None,
            referrer_email: None,
        },
    };

    Ok(Json(response))
}

pub async fn track_referral(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<TrackReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let referral = app_state
        .ledger
        .track_referral(body.referrer_id, &body.email)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReferralResponseDto {
            status: "success".to_string(),
            data: referral,
        }),
    ))
}

pub async fn complete_referral(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<CompleteReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let referral = app_state
        .ledger
        .complete_referral(body.referrer_id, body.referral_id, &body.subscription_id)
        .await?
        .ok_or_else(|| HttpError::not_found("No pending referral found"))?;

    Ok(Json(ReferralResponseDto {
        status: "success".to_string(),
        data: referral,
    }))
}
