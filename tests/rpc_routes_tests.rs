// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP surface tests.
//!
//! These tests verify that:
//! 1. RPC routes reject requests without the shared secret
//! 2. Insert/select/delete work end to end over JSON
//! 3. Errors map to the documented status codes
//! 4. The OAuth callback stores the grant and sets a session cookie

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Duration;
use gdrive_auth::config::Config;
use gdrive_auth::middleware::auth::{Claims, SESSION_COOKIE};
use gdrive_auth::models::UserAccess;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{create_test_app, create_test_app_with, test_user, FakeProvider};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;

const RPC_SECRET: &str = "test_rpc_secret";

fn rpc(path: &str, secret: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", secret));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_rpc_without_secret_is_unauthorized() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(rpc("/rpc/users/select", None, json!({ "id": "u1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn test_rpc_with_wrong_secret_is_unauthorized() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(rpc("/rpc/users/select", Some("guess"), json!({ "id": "u1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn test_insert_select_delete_over_rpc() {
    let (app, _, _) = create_test_app();
    let user = test_user("u1", Duration::hours(1));

    let response = app
        .clone()
        .oneshot(rpc(
            "/rpc/users/insert",
            Some(RPC_SECRET),
            serde_json::to_value(&user).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(rpc("/rpc/users/select", Some(RPC_SECRET), json!({ "id": "u1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
    let selected: UserAccess = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(selected, user);

    let response = app
        .clone()
        .oneshot(rpc("/rpc/users/delete", Some(RPC_SECRET), json!({ "id": "u1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(rpc("/rpc/users/select", Some(RPC_SECRET), json!({ "id": "u1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_invalid_insert_is_bad_request() {
    let (app, state, _) = create_test_app();
    let mut user = test_user("u1", Duration::hours(1));
    user.scope = " ".to_string();

    let response = app
        .oneshot(rpc(
            "/rpc/users/insert",
            Some(RPC_SECRET),
            serde_json::to_value(&user).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");

    let ctx = gdrive_auth::context::RequestContext::background();
    assert!(state.user_service.get_user(&ctx, "u1").await.is_err());
}

#[tokio::test]
async fn test_blank_id_is_bad_request() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(rpc("/rpc/users/delete", Some(RPC_SECRET), json!({ "id": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_parameter");
}

#[tokio::test]
async fn test_select_refreshes_expiring_grant() {
    let (app, state, provider) = create_test_app();
    let ctx = gdrive_auth::context::RequestContext::background();
    let stored = test_user("u1", Duration::minutes(1));
    state.user_service.create_user(&ctx, &stored).await.unwrap();

    let response = app
        .oneshot(rpc("/rpc/users/select", Some(RPC_SECRET), json!({ "id": "u1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let selected: UserAccess = serde_json::from_value(body_json(response).await).unwrap();
    assert_ne!(selected.access_token, stored.access_token);
    assert_eq!(provider.refreshes(), 1);
}

#[tokio::test]
async fn test_callback_without_code_is_bad_request() {
    let (app, _, provider) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/oauth/auth?code=%20")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.exchanges(), 0);
}

#[tokio::test]
async fn test_callback_stores_grant_and_sets_session() {
    let (app, state, provider) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/oauth/auth?code=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://drive.google.com/"
    );
    assert_eq!(provider.exchanges(), 1);

    let session = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(SESSION_COOKIE))
        .expect("session cookie should be set")
        .to_string();
    assert!(session.contains("HttpOnly"));

    let jwt = session
        .trim_start_matches(&format!("{}=", SESSION_COOKIE))
        .split(';')
        .next()
        .unwrap();
    let claims = decode::<Claims>(
        jwt,
        &DecodingKey::from_secret(&state.config.jwt_signing_key),
        &Validation::new(Algorithm::HS256),
    )
    .unwrap()
    .claims;
    assert_eq!(claims.sub, "google-user-1");

    let ctx = gdrive_auth::context::RequestContext::background();
    let stored = state
        .user_service
        .get_user(&ctx, "google-user-1")
        .await
        .unwrap();
    assert_eq!(stored.access_token, "access-for-abc");
    assert_eq!(stored.refresh_token, "refresh-for-abc");
    assert!(stored.scope.contains("drive.file"));
}

#[tokio::test]
async fn test_callback_with_forged_state_is_rejected() {
    let (app, _, provider) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/oauth/auth?code=abc&state=forged")
                .header(header::COOKIE, "gdrive_oauth_state=expected")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.exchanges(), 0);
}

#[tokio::test]
async fn test_failed_exchange_is_bad_gateway() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/oauth/auth?code=bad-code")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_slow_exchange_times_out() {
    let config = Config {
        request_timeout: std::time::Duration::from_millis(100),
        ..Config::test_default()
    };
    let provider = Arc::new(FakeProvider::with_latency(
        std::time::Duration::from_secs(2),
    ));
    let (app, state) = create_test_app_with(config, provider.clone());

    let started = std::time::Instant::now();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/oauth/auth?code=slow")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
    assert_eq!(provider.exchanges(), 1);

    let ctx = gdrive_auth::context::RequestContext::background();
    assert!(state
        .user_service
        .get_user(&ctx, "google-user-1")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_login_redirects_to_google_with_state_cookie() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/oauth/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://accounts.google.com/"));
    assert!(location.contains("access_type=offline"));

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("gdrive_oauth_state="));
}
