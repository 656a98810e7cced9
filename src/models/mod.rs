// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod game;
pub mod player;
pub mod stat;
pub mod user;

pub use game::{Game, GameDetails, GameSummary, Installment};
pub use player::Player;
pub use stat::{MatchOutcome, NewStat, Stat, StatEntry};
pub use user::{TrustedEmails, User};
