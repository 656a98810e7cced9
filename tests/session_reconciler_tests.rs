// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client session state machine tests against a scripted backend.

use async_trait::async_trait;
use game_stats_tracker::client::session::{Role, SessionBackend, SessionReconciler, SessionState};
use game_stats_tracker::client::ClientError;
use game_stats_tracker::models::TrustedEmails;
use game_stats_tracker::routes::auth::LoginResponse;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const ADMIN: &str = "admin@example.com";
const VISITOR: &str = "visitor@example.com";

/// Backend that trusts a fixed email and counts calls.
#[derive(Default)]
struct ScriptedBackend {
    server_trusts_admin: bool,
    fail: AtomicBool,
    logins: AtomicUsize,
    registrations: AtomicUsize,
}

impl ScriptedBackend {
    fn trusting() -> Self {
        Self {
            server_trusts_admin: true,
            ..Self::default()
        }
    }

    fn unavailable() -> ClientError {
        ClientError::Api {
            status: 500,
            code: "database_error".to_string(),
            message: "A storage error occurred".to_string(),
        }
    }
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn issue_credential(&self, email: &str) -> Result<LoginResponse, ClientError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(LoginResponse {
            token: format!("token-{}", n),
            is_trusted: self.server_trusts_admin && email == ADMIN,
        })
    }

    async fn register_guest(&self, _email: &str) -> Result<(), ClientError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }
}

fn reconciler(backend: ScriptedBackend) -> SessionReconciler<ScriptedBackend> {
    SessionReconciler::new(backend, TrustedEmails::new([ADMIN]))
}

fn role(state: &SessionState) -> Option<Role> {
    match state {
        SessionState::Authenticated(session) => Some(session.role),
        _ => None,
    }
}

#[tokio::test]
async fn test_allow_listed_identity_gets_trusted_session() {
    let mut session = reconciler(ScriptedBackend::trusting());

    let state = session.observe(Some(ADMIN)).await;
    assert_eq!(role(state), Some(Role::Trusted));
    assert_eq!(session.bearer_credential(), Some("token-0"));
    assert_eq!(session.backend().registrations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_other_identity_registers_as_guest() {
    let mut session = reconciler(ScriptedBackend::trusting());

    let state = session.observe(Some(VISITOR)).await;
    assert_eq!(role(state), Some(Role::Guest));
    assert_eq!(session.bearer_credential(), None);
    assert_eq!(session.backend().logins.load(Ordering::SeqCst), 0);
    assert_eq!(session.backend().registrations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_has_final_say_on_trust() {
    // Client allow-list says trusted, server disagrees
    let mut session = reconciler(ScriptedBackend::default());

    let state = session.observe(Some(ADMIN)).await;
    assert_eq!(role(state), Some(Role::Guest));
    assert_eq!(session.bearer_credential(), None);
}

#[tokio::test]
async fn test_failure_then_retry() {
    let backend = ScriptedBackend::trusting();
    backend.fail.store(true, Ordering::SeqCst);
    let mut session = reconciler(backend);

    assert!(matches!(
        session.observe(Some(ADMIN)).await,
        SessionState::LoginFailed { .. }
    ));

    // Staying on the failure page does not retry by itself
    session.observe(Some(ADMIN)).await;
    assert_eq!(session.backend().logins.load(Ordering::SeqCst), 1);

    session.backend().fail.store(false, Ordering::SeqCst);
    assert_eq!(session.request_login(), &SessionState::AwaitingExternalLogin);
    let state = session.observe(Some(ADMIN)).await;
    assert_eq!(role(state), Some(Role::Trusted));
}

#[tokio::test]
async fn test_awaiting_login_waits_for_identity() {
    let mut session = reconciler(ScriptedBackend::trusting());

    session.request_login();
    assert_eq!(session.observe(None).await, &SessionState::AwaitingExternalLogin);

    let state = session.observe(Some(VISITOR)).await;
    assert_eq!(role(state), Some(Role::Guest));

    // Already authenticated: request_login is ignored
    assert_eq!(role(session.request_login()), Some(Role::Guest));
}

#[tokio::test]
async fn test_rejected_credential_is_silently_reissued() {
    let mut session = reconciler(ScriptedBackend::trusting());
    session.observe(Some(ADMIN)).await;

    session.credential_rejected();
    assert_eq!(session.bearer_credential(), None);

    let state = session.observe(Some(ADMIN)).await;
    assert_eq!(role(state), Some(Role::Trusted));
    assert_eq!(session.bearer_credential(), Some("token-1"));
}

#[tokio::test]
async fn test_failed_reissue_drops_to_anonymous() {
    let mut session = reconciler(ScriptedBackend::trusting());
    session.observe(Some(ADMIN)).await;

    session.credential_rejected();
    session.backend().fail.store(true, Ordering::SeqCst);

    assert_eq!(session.observe(Some(ADMIN)).await, &SessionState::Anonymous);
}

#[tokio::test]
async fn test_steady_state_makes_no_calls() {
    let mut session = reconciler(ScriptedBackend::trusting());
    session.observe(Some(ADMIN)).await;
    session.observe(Some(ADMIN)).await;
    session.observe(Some(ADMIN)).await;

    assert_eq!(session.backend().logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_logout_and_provider_signout() {
    let mut session = reconciler(ScriptedBackend::trusting());
    session.observe(Some(ADMIN)).await;
    assert_eq!(session.logout(), &SessionState::Anonymous);

    session.observe(Some(VISITOR)).await;
    assert_eq!(session.observe(None).await, &SessionState::Anonymous);
}
