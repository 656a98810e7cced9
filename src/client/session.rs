// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side session state.
//!
//! The reconciler turns the identity provider's view of the user (an email,
//! or nothing) into an application session. It is advisory: the server
//! decides trust on every login, and the local allow-list only picks which
//! endpoint to call.

use async_trait::async_trait;

use crate::client::ClientError;
use crate::models::TrustedEmails;
use crate::routes::auth::LoginResponse;

/// Calls the reconciler makes against the API.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn issue_credential(&self, email: &str) -> Result<LoginResponse, ClientError>;

    async fn register_guest(&self, email: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Trusted,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub email: String,
    pub role: Role,
    credential: Option<String>,
}

impl Session {
    /// Trusted session whose credential was rejected and not yet replaced.
    pub fn needs_reissue(&self) -> bool {
        self.role == Role::Trusted && self.credential.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    /// The identity provider's interactive login is in progress.
    AwaitingExternalLogin,
    Authenticated(Session),
    LoginFailed { reason: String },
}

pub struct SessionReconciler<B> {
    backend: B,
    trusted_emails: TrustedEmails,
    state: SessionState,
}

impl<B: SessionBackend> SessionReconciler<B> {
    pub fn new(backend: B, trusted_emails: TrustedEmails) -> Self {
        Self {
            backend,
            trusted_emails,
            state: SessionState::Anonymous,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Credential to send as a bearer token. Only trusted sessions have one.
    pub fn bearer_credential(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(Session {
                role: Role::Trusted,
                credential: Some(token),
                ..
            }) => Some(token),
            _ => None,
        }
    }

    /// Feed the identity provider's current view of the user.
    pub async fn observe(&mut self, identity: Option<&str>) -> &SessionState {
        let next = match (&self.state, identity) {
            (SessionState::Anonymous | SessionState::AwaitingExternalLogin, Some(email)) => {
                Some(self.authenticate(email).await)
            }
            (SessionState::Authenticated(session), Some(email)) if session.email != email => {
                tracing::debug!("Identity changed, starting a new session");
                Some(self.authenticate(email).await)
            }
            (SessionState::Authenticated(session), Some(email)) if session.needs_reissue() => {
                Some(self.reissue(email).await)
            }
            (SessionState::Authenticated(_), None) => Some(SessionState::Anonymous),
            _ => None,
        };

        if let Some(next) = next {
            self.transition(next);
        }
        &self.state
    }

    /// Begin an interactive login. Only valid from `Anonymous` or
    /// `LoginFailed`.
    pub fn request_login(&mut self) -> &SessionState {
        if matches!(
            self.state,
            SessionState::Anonymous | SessionState::LoginFailed { .. }
        ) {
            self.transition(SessionState::AwaitingExternalLogin);
        }
        &self.state
    }

    /// The API refused the current credential. The next `observe` re-issues.
    pub fn credential_rejected(&mut self) {
        if let SessionState::Authenticated(session) = &mut self.state {
            if session.role == Role::Trusted {
                tracing::debug!("Credential rejected, will re-issue");
                session.credential = None;
            }
        }
    }

    pub fn logout(&mut self) -> &SessionState {
        self.transition(SessionState::Anonymous);
        &self.state
    }

    fn transition(&mut self, next: SessionState) {
        if next != self.state {
            tracing::debug!(
                from = state_name(&self.state),
                to = state_name(&next),
                "Session transition"
            );
        }
        self.state = next;
    }

    async fn authenticate(&self, email: &str) -> SessionState {
        if self.trusted_emails.contains(email) {
            match self.backend.issue_credential(email).await {
                Ok(login) => authenticated(email, login),
                Err(e) => SessionState::LoginFailed {
                    reason: e.to_string(),
                },
            }
        } else {
            match self.backend.register_guest(email).await {
                Ok(()) => SessionState::Authenticated(Session {
                    email: email.to_string(),
                    role: Role::Guest,
                    credential: None,
                }),
                Err(e) => SessionState::LoginFailed {
                    reason: e.to_string(),
                },
            }
        }
    }

    async fn reissue(&self, email: &str) -> SessionState {
        match self.backend.issue_credential(email).await {
            Ok(login) => authenticated(email, login),
            Err(e) => {
                tracing::warn!(error = %e, "Silent credential re-issue failed");
                SessionState::Anonymous
            }
        }
    }
}

fn authenticated(email: &str, login: LoginResponse) -> SessionState {
    let (role, credential) = if login.is_trusted {
        (Role::Trusted, Some(login.token))
    } else {
        (Role::Guest, None)
    };
    SessionState::Authenticated(Session {
        email: email.to_string(),
        role,
        credential,
    })
}

fn state_name(state: &SessionState) -> &'static str {
    match state {
        SessionState::Anonymous => "anonymous",
        SessionState::AwaitingExternalLogin => "awaiting_external_login",
        SessionState::Authenticated(Session {
            role: Role::Trusted,
            ..
        }) => "trusted",
        SessionState::Authenticated(_) => "guest",
        SessionState::LoginFailed { .. } => "login_failed",
    }
}
