// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use game_stats_tracker::config::Config;
use game_stats_tracker::db::{MemoryStore, Store};
use game_stats_tracker::routes::create_router;
use game_stats_tracker::services::issue_credential_at;
use game_stats_tracker::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TRUSTED: &str = "admin@example.com";

/// PostgreSQL URL for the storage tests, when one is configured.
#[allow(dead_code)]
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Skip test with message if no test database is configured.
#[macro_export]
macro_rules! require_database {
    () => {
        match crate::common::test_database_url() {
            Some(url) => url,
            None => {
                eprintln!("⚠️  Skipping: TEST_DATABASE_URL not set");
                return;
            }
        }
    };
}

/// Test app backed by an in-memory store.
/// Returns the router, the shared state and the store for inspection.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(
        Config::test_default(),
        store.clone() as Arc<dyn Store>,
    ));
    (create_router(state.clone()), state, store)
}

/// Test app whose store fails every call.
#[allow(dead_code)]
pub fn create_offline_app() -> Router {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        Arc::new(MemoryStore::offline()),
    ));
    create_router(state)
}

/// Sign a credential for `email` with the test key.
#[allow(dead_code)]
pub fn bearer_for(email: &str) -> String {
    let config = Config::test_default();
    let token = issue_credential_at(email, 0, false, &config.jwt_signing_key, Utc::now())
        .expect("sign test credential");
    format!("Bearer {}", token)
}

/// Send a request and decode the JSON body (`Value::Null` when empty).
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
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
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// POST to an API-key protected route with the test key.
#[allow(dead_code)]
pub async fn send_keyed(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("X-API-KEY", Config::test_default().api_key)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Log in through the API and return the `Authorization` header value.
#[allow(dead_code)]
pub async fn login(app: &Router, email: &str) -> String {
    let (status, body) = send_keyed(app, "/api/login", serde_json::json!({ "email": email })).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    format!("Bearer {}", body["token"].as_str().unwrap())
}
