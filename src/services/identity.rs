// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User identity: credential issuing, guest registration and trust
//! overrides.
//!
//! The trust allow-list is passed in by the caller. Whenever a credential is
//! issued the stored flag is forced to match allow-list membership.

use chrono::{DateTime, Utc};

use crate::db::{Store, StoreError};
use crate::error::{AppError, Result};
use crate::models::{TrustedEmails, User};
use crate::services::credentials::issue_credential_at;

/// A freshly signed credential and the user it was issued for.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub token: String,
    pub user: User,
}

/// Outcome of a guest registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    AlreadyExists,
}

/// Insert a user, or fetch it when a concurrent insert won the race.
async fn insert_or_fetch(store: &dyn Store, email: &str, is_trusted: bool) -> Result<(User, bool)> {
    match store.insert_user(email, is_trusted).await {
        Ok(user) => Ok((user, true)),
        Err(e) if e.is_unique_violation() => {
            tracing::debug!(email = %email, "User created concurrently, re-reading");
            let user = store.find_user(email).await?.ok_or_else(|| {
                AppError::Database(format!("user {} vanished after unique violation", email))
            })?;
            Ok((user, false))
        }
        Err(e) => Err(e.into()),
    }
}

/// Find or create the user for `email` and force its trust flag to match the
/// allow-list.
pub async fn reconcile_user(
    store: &dyn Store,
    trusted_emails: &TrustedEmails,
    email: &str,
) -> Result<User> {
    let should_be_trusted = trusted_emails.contains(email);

    let mut user = match store.find_user(email).await? {
        Some(user) => user,
        None => {
            let (user, created) = insert_or_fetch(store, email, should_be_trusted).await?;
            if created {
                tracing::info!(
                    user_id = user.user_id,
                    is_trusted = user.is_trusted,
                    "Created user on login"
                );
            }
            user
        }
    };

    if user.is_trusted != should_be_trusted {
        store.set_user_trust(user.user_id, should_be_trusted).await?;
        tracing::info!(
            user_id = user.user_id,
            from = user.is_trusted,
            to = should_be_trusted,
            "Reconciled trust flag with allow-list"
        );
        user.is_trusted = should_be_trusted;
    }

    Ok(user)
}

/// Reconcile the user and sign a credential for it.
pub async fn issue_credential(
    store: &dyn Store,
    trusted_emails: &TrustedEmails,
    email: &str,
    signing_key: &[u8],
    now: DateTime<Utc>,
) -> Result<IssuedCredential> {
    let user = reconcile_user(store, trusted_emails, email).await?;
    let token = issue_credential_at(&user.email, user.user_id, user.is_trusted, signing_key, now)?;

    Ok(IssuedCredential { token, user })
}

/// Register `email` as an untrusted user. Existing users are left untouched.
pub async fn register_guest(store: &dyn Store, email: &str) -> Result<Registration> {
    if store.find_user(email).await?.is_some() {
        return Ok(Registration::AlreadyExists);
    }

    match store.insert_user(email, false).await {
        Ok(user) => {
            tracing::info!(user_id = user.user_id, "Registered guest user");
            Ok(Registration::Created)
        }
        Err(StoreError::UniqueViolation { .. }) => Ok(Registration::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

/// Create or update a user with an explicit trust flag.
pub async fn set_trust_override(store: &dyn Store, email: &str, is_trusted: bool) -> Result<User> {
    let (mut user, _) = match store.find_user(email).await? {
        Some(user) => (user, false),
        None => insert_or_fetch(store, email, is_trusted).await?,
    };

    if user.is_trusted != is_trusted {
        store.set_user_trust(user.user_id, is_trusted).await?;
        user.is_trusted = is_trusted;
    }
    tracing::info!(user_id = user.user_id, is_trusted, "Applied trust override");

    Ok(user)
}
