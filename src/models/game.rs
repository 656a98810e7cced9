// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Game catalogue entries.
//!
//! Games are shared between users: a game is identified by its
//! `(game_name, game_installment)` pair, where a missing installment is a key
//! value of its own ("the main game").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display label for a game without an installment.
pub const MAIN_GAME_LABEL: &str = "(Main Game)";

/// Game row stored in `dim.games`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Game {
    pub game_id: i64,
    pub game_name: String,
    pub game_installment: Option<String>,
    pub game_genre: Option<String>,
    pub game_subgenre: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_played_at: DateTime<Utc>,
}

impl Game {
    /// True when this row is the one addressed by `(name, installment)`.
    pub fn matches_key(&self, name: &str, installment: Option<&str>) -> bool {
        self.game_name == name && self.game_installment.as_deref() == installment
    }
}

/// Game attributes supplied by a stat submission or a game edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDetails {
    pub name: String,
    pub installment: Option<String>,
    pub genre: Option<String>,
    pub subgenre: Option<String>,
}

impl GameDetails {
    /// Build details, treating blank optional fields as absent.
    pub fn new(
        name: impl Into<String>,
        installment: Option<String>,
        genre: Option<String>,
        subgenre: Option<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            installment: non_blank(installment),
            genre: non_blank(genre),
            subgenre: non_blank(subgenre),
        }
    }
}

/// `(game_id, game_name)` listing entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, sqlx::FromRow)]
pub struct GameSummary {
    pub game_id: i64,
    pub game_name: String,
}

/// One installment of a franchise the caller has stats for.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Installment {
    pub game_id: i64,
    pub game_installment: Option<String>,
}

impl Installment {
    /// Name to show, with the main game labelled explicitly.
    pub fn display_name(&self) -> String {
        self.game_installment
            .clone()
            .unwrap_or_else(|| MAIN_GAME_LABEL.to_string())
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
