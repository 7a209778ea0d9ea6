use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        auth::auth_handler, referrals::referrals_handler, users::users_handler,
        withdrawals::withdrawals_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest(
            "/users",
            users_handler()
                .layer(middleware::from_fn(auth))
        )
        // Member, public and webhook routes each carry their own guard
        .nest("/referrals", referrals_handler())
        .nest(
            "/withdrawals",
            withdrawals_handler()
                .layer(middleware::from_fn(auth))
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{config::Config, db::MemoryStore, middleware::WEBHOOK_SECRET_HEADER};

    fn app_with(config: Config) -> Router {
        create_router(Arc::new(AppState::new(config, Arc::new(MemoryStore::new()))))
    }

    fn app() -> Router {
        let mut config = Config::for_tests();
        config.withdrawal_threshold_points = 4;
        app_with(config)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        webhook_secret: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(secret) = webhook_secret {
            builder = builder.header(WEBHOOK_SECRET_HEADER, secret);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, email: &str, promo_code: Option<&str>) -> (StatusCode, Value) {
        send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            None,
            Some(json!({
                "email": email,
                "password": "password123",
                "passwordConfirm": "password123",
                "promoCode": promo_code,
            })),
        )
        .await
    }

    /// Registers `email` and returns its token and profile id.
    async fn member(app: &Router, email: &str) -> (String, String) {
        let (status, body) = register(app, email, None).await;
        assert_eq!(status, StatusCode::CREATED);
        (
            body["token"].as_str().unwrap().to_string(),
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn complete_referrals(app: &Router, referrer_id: &str, count: usize) {
        for i in 0..count {
            let (status, _) = send(
                app,
                Method::POST,
                "/api/referrals/track",
                None,
                Some("webhook-secret"),
                Some(json!({ "referrerId": referrer_id, "email": format!("friend{}@example.com", i) })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, _) = send(
                app,
                Method::POST,
                "/api/referrals/complete",
                None,
                Some("webhook-secret"),
                Some(json!({ "referrerId": referrer_id, "subscriptionId": format!("sub_{}", i) })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_register_provisions_dashboard() {
        let app = app();
        let (token, _) = member(&app, "ada@example.com").await;

        let (status, body) = send(&app, Method::GET, "/api/users/me", Some(&token), None, None).await;

        assert_eq!(status, StatusCode::OK);
        let user = &body["data"]["user"];
        assert_eq!(user["points"], 0);
        assert_eq!(user["referrals"], 0);
        assert_eq!(user["promoCode"].as_str().unwrap().len(), 6);
        assert_eq!(body["data"]["progress"]["eligible"], false);
        assert_eq!(body["data"]["rewardPerReferral"], 2);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (status, body) = send(&app(), Method::GET, "/api/users/me", None, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "fail");
    }

    #[tokio::test]
    async fn test_login_after_register() {
        let app = app();
        member(&app, "ada@example.com").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            None,
            Some(json!({ "email": "ada@example.com", "password": "password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].as_str().is_some());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_with_promo_code_tracks_referral() {
        let app = app();
        let (token, _) = member(&app, "ada@example.com").await;
        let (_, body) = send(&app, Method::GET, "/api/users/promo-code", Some(&token), None, None).await;
        let code = body["promoCode"].as_str().unwrap().to_string();
        assert!(body["referralLink"].as_str().unwrap().ends_with(&format!("?ref={}", code)));

        let (status, _) = register(&app, "bob@example.com", Some(&code.to_lowercase())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, Method::GET, "/api/referrals", Some(&token), None, None).await;
        assert_eq!(status, StatusCode::OK);
        let referrals = body["data"]["referrals"].as_array().unwrap();
        assert_eq!(referrals.len(), 1);
        assert_eq!(referrals[0]["email"], "bob@example.com");
        assert_eq!(referrals[0]["status"], "pending");
        assert_eq!(body["data"]["totalPoints"], 0);
    }

    #[tokio::test]
    async fn test_register_rejects_unknown_promo_code() {
        let app = app();
        let (status, _) = register(&app, "bob@example.com", Some("ZZZZZZ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Nothing was written for the rejected registration
        let (status, _) = register(&app, "bob@example.com", None).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_validate_promo_code() {
        let app = app();
        let (token, id) = member(&app, "ada@example.com").await;
        let (_, body) = send(&app, Method::GET, "/api/users/promo-code", Some(&token), None, None).await;
        let code = body["promoCode"].as_str().unwrap().to_string();

        let uri = format!("/api/referrals/validate?code={}", code);
        let (status, body) = send(&app, Method::GET, &uri, None, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["referrerId"], id.as_str());

        let (_, body) = send(&app, Method::GET, "/api/referrals/validate?code=ZZZZZZ", None, None, None).await;
        assert_eq!(body["valid"], false);
    }

    #[tokio::test]
    async fn test_webhook_requires_secret() {
        let app = app();
        let (_, id) = member(&app, "ada@example.com").await;
        let body = json!({ "referrerId": id, "email": "bob@example.com" });

        let (status, _) = send(&app, Method::POST, "/api/referrals/track", None, None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/referrals/track",
            None,
            Some("not-the-secret"),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_completion_credits_referrer() {
        let app = app();
        let (token, id) = member(&app, "ada@example.com").await;

        complete_referrals(&app, &id, 1).await;

        let (_, body) = send(&app, Method::GET, "/api/users/me", Some(&token), None, None).await;
        assert_eq!(body["data"]["user"]["points"], 2);
        assert_eq!(body["data"]["user"]["referrals"], 1);

        let (_, body) = send(&app, Method::GET, "/api/referrals", Some(&token), None, None).await;
        assert_eq!(body["data"]["referrals"][0]["status"], "completed");
        assert_eq!(body["data"]["totalPoints"], 2);
    }

    #[tokio::test]
    async fn test_completion_without_pending_referral() {
        let app = app();
        let (_, id) = member(&app, "ada@example.com").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/referrals/complete",
            None,
            Some("webhook-secret"),
            Some(json!({ "referrerId": id, "subscriptionId": "sub_1" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_withdrawal_gate() {
        let app = app();
        let (token, id) = member(&app, "ada@example.com").await;
        let request = json!({ "idempotencyKey": "payout-1" });

        complete_referrals(&app, &id, 1).await;
        let (status, body) = send(&app, Method::POST, "/api/withdrawals", Some(&token), None, Some(request.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], "fail");

        complete_referrals(&app, &id, 3).await;
        let (status, body) = send(&app, Method::POST, "/api/withdrawals", Some(&token), None, Some(request.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["replayed"], false);
        assert_eq!(body["data"]["points"], 4);

        let (status, body) = send(&app, Method::POST, "/api/withdrawals", Some(&token), None, Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["replayed"], true);

        let (status, body) = send(&app, Method::GET, "/api/withdrawals", Some(&token), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
        assert_eq!(body["progress"]["points"], 4);
        assert_eq!(body["progress"]["withdrawals"], 1);
    }

    #[tokio::test]
    async fn test_withdrawal_retry_after_spending_to_zero() {
        let app = app();
        let (token, id) = member(&app, "ada@example.com").await;
        let request = json!({ "idempotencyKey": "k1" });

        complete_referrals(&app, &id, 2).await;
        let (status, first) = send(&app, Method::POST, "/api/withdrawals", Some(&token), None, Some(request.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, retry) = send(&app, Method::POST, "/api/withdrawals", Some(&token), None, Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retry["replayed"], true);
        assert_eq!(retry["data"]["id"], first["data"]["id"]);

        // A fresh key is still held to the threshold
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/withdrawals",
            Some(&token),
            None,
            Some(json!({ "idempotencyKey": "k2" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = send(&app, Method::GET, "/api/users/me", Some(&token), None, None).await;
        assert_eq!(body["data"]["user"]["points"], 0);
        assert_eq!(body["data"]["user"]["withdrawals"], 1);
    }

    #[tokio::test]
    async fn test_update_settings() {
        let app = app();
        let (token, _) = member(&app, "ada@example.com").await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/users/settings",
            Some(&token),
            None,
            Some(json!({ "name": "Ada", "emailNotifications": false })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["name"], "Ada");
        assert_eq!(body["data"]["user"]["emailNotifications"], false);
    }
}
