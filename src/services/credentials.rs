// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed, short-lived bearer credentials.
//!
//! Credentials are HS256 JWTs carrying the caller's email. The embedded trust
//! flag is informational; authorization always re-reads the user row.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// Lifetime of an issued credential.
pub const CREDENTIAL_TTL_MINUTES: i64 = 60;

/// Clock skew tolerated on `exp`.
pub const LEEWAY_SECS: u64 = 10;

/// Credential claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub is_trusted: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("credential expired")]
    Expired,

    /// Bad signature, malformed token or unexpected algorithm.
    #[error("credential invalid")]
    Invalid,

    #[error("{0}")]
    Signing(String),
}

/// Sign a credential as if issued at `now`.
pub fn issue_credential_at(
    email: &str,
    user_id: i64,
    is_trusted: bool,
    signing_key: &[u8],
    now: DateTime<Utc>,
) -> Result<String, CredentialError> {
    let claims = Claims {
        email: Some(email.to_string()),
        user_id,
        is_trusted,
        iat: now.timestamp(),
        exp: (now + Duration::minutes(CREDENTIAL_TTL_MINUTES)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .map_err(|e| CredentialError::Signing(e.to_string()))
}

/// Verify a credential against the wall clock.
pub fn verify_credential(token: &str, signing_key: &[u8]) -> Result<Claims, CredentialError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = LEEWAY_SECS;

    decode::<Claims>(token, &DecodingKey::from_secret(signing_key), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => CredentialError::Expired,
            _ => CredentialError::Invalid,
        })
}
