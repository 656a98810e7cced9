// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer credential middleware.

use crate::error::AppError;
use crate::services::credentials::verify_credential;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated caller extracted from a verified credential.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
}

/// Middleware that requires a valid bearer credential.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::debug!(path = %request.uri().path(), "Missing bearer credential");
            AppError::MissingCredential
        })?;

    let claims = verify_credential(token, &state.config.jwt_signing_key).map_err(|e| {
        tracing::warn!(reason = %e, "Rejected credential");
        AppError::from(e)
    })?;

    let email = claims
        .email
        .filter(|e| !e.is_empty())
        .ok_or(AppError::InvalidToken)?;

    request.extensions_mut().insert(AuthUser { email });

    Ok(next.run(request).await)
}
