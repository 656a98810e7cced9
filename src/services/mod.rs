// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod gateway;
pub mod identity;

pub use credentials::{issue_credential_at, verify_credential, Claims, CredentialError};
pub use gateway::{StatDeletion, StatSubmission, StatsGateway};
pub use identity::{issue_credential, register_guest, set_trust_override, IssuedCredential, Registration};
