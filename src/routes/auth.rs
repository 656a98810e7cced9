// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, guest registration and trust override routes.
//!
//! All of these sit behind the shared API key; none requires a credential.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::services::identity::{self, Registration};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/add_user", post(add_user))
        .route("/api/add_trusted_user", post(add_trusted_user))
}

/// Body carrying just an email.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email, length(max = 255))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TrustOverrideRequest {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[serde(default = "default_trusted")]
    pub is_trusted: bool,
}

fn default_trusted() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct LoginResponse {
    pub token: String,
    pub is_trusted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct MessageResponse {
    pub message: String,
}

/// Unwrap a JSON body and check its field constraints.
fn validated<T: Validate>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    let Json(body) = payload?;
    body.validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid request: {}", e)))?;
    Ok(body)
}

/// Issue a credential, reconciling the user's trust flag first.
async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let request = validated(payload)?;

    let issued = identity::issue_credential(
        state.store.as_ref(),
        &state.config.trusted_emails,
        &request.email,
        &state.config.jwt_signing_key,
        Utc::now(),
    )
    .await?;

    tracing::info!(
        user_id = issued.user.user_id,
        is_trusted = issued.user.is_trusted,
        "Issued credential"
    );

    Ok(Json(LoginResponse {
        token: issued.token,
        is_trusted: issued.user.is_trusted,
    }))
}

/// Register a guest user. Never issues a credential.
async fn add_user(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<EmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let request = validated(payload)?;

    let (status, message) = match identity::register_guest(state.store.as_ref(), &request.email).await? {
        Registration::Created => (StatusCode::CREATED, "User added successfully"),
        Registration::AlreadyExists => (StatusCode::OK, "User already exists"),
    };

    Ok((
        status,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    ))
}

/// Create or update a user with an explicit trust flag.
async fn add_trusted_user(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TrustOverrideRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let request = validated(payload)?;

    let user =
        identity::set_trust_override(state.store.as_ref(), &request.email, request.is_trusted)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!(
                "User {} saved with is_trusted={}",
                user.email, user.is_trusted
            ),
        }),
    ))
}
