// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model and the trusted-email allow-list.

use serde::{Deserialize, Serialize};

/// User row stored in `dim.users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Surrogate key
    pub user_id: i64,
    /// Login email (unique)
    #[sqlx(rename = "user_email")]
    pub email: String,
    /// Only trusted users may mutate data
    pub is_trusted: bool,
}

/// Emails that must be trusted. Injected from configuration and consulted
/// when issuing credentials; never read from a global.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedEmails(Vec<String>);

impl TrustedEmails {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            emails
                .into_iter()
                .map(Into::into)
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    /// Parse a comma-separated list, ignoring blanks.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    /// Exact membership check.
    pub fn contains(&self, email: &str) -> bool {
        self.0.iter().any(|e| e == email)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
