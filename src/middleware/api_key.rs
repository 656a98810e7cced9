// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-secret gate for the login and registration endpoints.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// `X-API-KEY`, lowercased for `HeaderName::from_static`.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware that requires `X-API-KEY` to match the configured secret.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|h| h.as_bytes())
        .unwrap_or_default();

    if !bool::from(provided.ct_eq(state.config.api_key.as_bytes())) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
        return Err(AppError::InvalidApiKey);
    }

    Ok(next.run(request).await)
}
