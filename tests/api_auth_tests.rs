// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid credentials
//! 2. The API-key routes issue credentials and register guests
//! 3. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use game_stats_tracker::config::Config;
use game_stats_tracker::db::Store;
use game_stats_tracker::services::issue_credential_at;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{bearer_for, create_offline_app, create_test_app, login, send, send_keyed, TRUSTED};

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _, _) = create_test_app();

    let (status, body) = send(&app, "GET", "/api/get_players", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth_missing");
}

#[tokio::test]
async fn test_protected_route_with_non_bearer_header() {
    let (app, _, _) = create_test_app();

    let (status, body) = send(&app, "GET", "/api/get_players", Some("Basic abc"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth_missing");
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _, _) = create_test_app();

    let (status, body) = send(
        &app,
        "GET",
        "/api/get_players",
        Some("Bearer invalid.token.here"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth_invalid");
}

#[tokio::test]
async fn test_protected_route_with_expired_token() {
    let (app, _, _) = create_test_app();
    let key = Config::test_default().jwt_signing_key;
    let issued_at = Utc::now() - Duration::minutes(61);
    let token = issue_credential_at(TRUSTED, 1, true, &key, issued_at).unwrap();

    let (status, body) = send(
        &app,
        "GET",
        "/api/get_players",
        Some(&format!("Bearer {}", token)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth_expired");
}

#[tokio::test]
async fn test_token_without_email_is_invalid() {
    #[derive(Serialize)]
    struct Claims {
        user_id: i64,
        iat: i64,
        exp: i64,
    }

    let (app, _, _) = create_test_app();
    let now = Utc::now().timestamp();
    let token = encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            user_id: 1,
            iat: now,
            exp: now + 600,
        },
        &EncodingKey::from_secret(&Config::test_default().jwt_signing_key),
    )
    .unwrap();

    let (status, body) = send(
        &app,
        "GET",
        "/api/get_players",
        Some(&format!("Bearer {}", token)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth_invalid");
}

#[tokio::test]
async fn test_protected_route_with_valid_token() {
    let (app, _, _) = create_test_app();

    // Unknown caller: lists are empty rather than an error
    let (status, body) = send(
        &app,
        "GET",
        "/api/get_players",
        Some(&bearer_for("nobody@example.com")),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "players": [] }));
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/login")
                .header(header::ORIGIN, "http://localhost:8501")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-api-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_health_routes() {
    let (app, _, _) = create_test_app();

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(&app, "GET", "/db_health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let offline = create_offline_app();
    let (status, body) = send(&offline, "GET", "/db_health", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

// ─── API key routes ──────────────────────────────────────────

#[tokio::test]
async fn test_login_requires_api_key() {
    let (app, _, _) = create_test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "email": TRUSTED })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/login")
                .header("X-API-KEY", "wrong")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "email": TRUSTED }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_email_before_storage() {
    let (app, _, store) = create_test_app();

    for body in [json!({ "email": "not-an-email" }), json!({}), json!({ "email": 7 })] {
        let (status, response) = send_keyed(&app, "/api/login", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "bad_request");
    }
    assert!(store.find_user("not-an-email").await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_trusted_and_guest() {
    let (app, _, store) = create_test_app();

    let (status, body) = send_keyed(&app, "/api/login", json!({ "email": TRUSTED })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_trusted"], true);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

    let (status, body) = send_keyed(&app, "/api/login", json!({ "email": "a@x.com" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_trusted"], false);
    assert!(!store.find_user("a@x.com").await.unwrap().unwrap().is_trusted);

    // Registering an existing user is a no-op
    let (status, body) = send_keyed(&app, "/api/add_user", json!({ "email": "a@x.com" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn test_add_user_creates_untrusted_user_without_token() {
    let (app, _, store) = create_test_app();

    let (status, body) = send_keyed(&app, "/api/add_user", json!({ "email": TRUSTED })).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body.get("token").is_none());
    // Even allow-listed emails register as guests
    assert!(!store.find_user(TRUSTED).await.unwrap().unwrap().is_trusted);
}

#[tokio::test]
async fn test_trust_override_is_reset_by_login() {
    let (app, _, store) = create_test_app();

    let (status, _) = send_keyed(
        &app,
        "/api/add_trusted_user",
        json!({ "email": "b@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(store.find_user("b@example.com").await.unwrap().unwrap().is_trusted);

    let auth = login(&app, "b@example.com").await;
    assert!(!auth.is_empty());
    assert!(!store.find_user("b@example.com").await.unwrap().unwrap().is_trusted);
}

#[tokio::test]
async fn test_trust_override_requires_boolean() {
    let (app, _, _) = create_test_app();

    let (status, body) = send_keyed(
        &app,
        "/api/add_trusted_user",
        json!({ "email": "b@example.com", "is_trusted": "yes" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_login_with_store_down_is_500() {
    let app = create_offline_app();

    let (status, body) = send_keyed(&app, "/api/login", json!({ "email": TRUSTED })).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "database_error");
}

#[tokio::test]
async fn test_credential_responses_are_not_cached() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/login")
                .header("X-API-KEY", Config::test_default().api_key)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "email": TRUSTED }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
}
