// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer.
//!
//! [`Store`] is the port the gateway and identity services talk to. Every
//! method that touches more than one statement is failure-atomic: either
//! all of its writes become visible or none do.
//!
//! - [`PgStore`]: PostgreSQL adapter (sqlx)
//! - [`MemoryStore`]: in-process adapter for tests and local runs

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::models::{Game, GameDetails, GameSummary, Installment, NewStat, Player, User};

/// Unique constraint names, as declared in `migrations/`.
pub mod constraints {
    pub const USER_EMAIL: &str = "users_user_email_key";
    pub const PLAYER_NAME_OWNER: &str = "players_player_name_user_id_key";
    pub const GAME_NAME_INSTALLMENT: &str = "games_game_name_game_installment_key";
}

/// Errors surfaced by storage adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other driver or query failure.
    #[error("query failed: {0}")]
    Query(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Which stats count when asking whether a game is still referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatScope {
    /// Stats recorded through players owned by this user
    Owner(i64),
    /// Stats from any user
    Any,
}

/// Ids touched by a successful stat submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedStats {
    pub game_id: i64,
    pub player_id: i64,
    pub inserted: usize,
    pub game_created: bool,
    pub player_created: bool,
}

/// Outcome of deleting a game that must be unreferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameDeletion {
    Deleted,
    /// At least one stat still points at the game; nothing was deleted.
    Referenced,
    Missing,
}

/// Free-text stat columns that can be listed per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListColumn {
    GameMode,
    StatType,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round-trip used by health checks.
    async fn ping(&self) -> Result<(), StoreError>;

    // ─── Users ───────────────────────────────────────────────────

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. Fails with [`StoreError::UniqueViolation`] when the
    /// email is already registered.
    async fn insert_user(&self, email: &str, is_trusted: bool) -> Result<User, StoreError>;

    async fn set_user_trust(&self, user_id: i64, is_trusted: bool) -> Result<(), StoreError>;

    // ─── Stats submission ────────────────────────────────────────

    /// Resolve or create the game and the owner's player, then insert every
    /// stat, all in one transaction.
    async fn record_stats(
        &self,
        owner_id: i64,
        game: &GameDetails,
        player_name: &str,
        stats: &[NewStat],
    ) -> Result<RecordedStats, StoreError>;

    // ─── Players ─────────────────────────────────────────────────

    /// Rename a player in a single conditional update that only matches when
    /// the player belongs to `owner_email` and that user is trusted.
    /// Returns the number of rows changed.
    async fn rename_player(
        &self,
        player_id: i64,
        owner_email: &str,
        new_name: &str,
    ) -> Result<u64, StoreError>;

    async fn player_owned_by(&self, player_id: i64, owner_id: i64) -> Result<bool, StoreError>;

    /// Delete the player's stats and then the player. Returns the number of
    /// stats removed, or `None` when the player was not found for this owner
    /// (nothing is changed in that case).
    async fn delete_player_cascade(
        &self,
        player_id: i64,
        owner_id: i64,
    ) -> Result<Option<u64>, StoreError>;

    async fn list_players(&self, owner_id: i64) -> Result<Vec<Player>, StoreError>;

    // ─── Games ───────────────────────────────────────────────────

    /// Fetch a game only if the owner has at least one stat on it.
    async fn find_game_with_owner_stats(
        &self,
        game_id: i64,
        owner_id: i64,
    ) -> Result<Option<Game>, StoreError>;

    /// Overwrite a game's descriptive columns. Returns rows changed.
    async fn update_game(&self, game_id: i64, details: &GameDetails) -> Result<u64, StoreError>;

    async fn game_has_stats(&self, game_id: i64, scope: StatScope) -> Result<bool, StoreError>;

    /// Delete a game after checking, in the same transaction, that no stat
    /// references it.
    async fn delete_unreferenced_game(&self, game_id: i64) -> Result<GameDeletion, StoreError>;

    async fn list_games(&self, owner_id: i64) -> Result<Vec<GameSummary>, StoreError>;

    async fn list_franchises(&self, owner_id: i64) -> Result<Vec<String>, StoreError>;

    async fn list_installments(
        &self,
        owner_id: i64,
        franchise: &str,
    ) -> Result<Vec<Installment>, StoreError>;

    /// Distinct non-empty pre/post-match ranks from the owner's ranked stats.
    async fn list_ranks(&self, owner_id: i64, game_id: i64) -> Result<Vec<String>, StoreError>;

    /// Distinct non-empty values of a text column of the owner's stats.
    async fn list_stat_column(
        &self,
        owner_id: i64,
        game_id: i64,
        column: ListColumn,
    ) -> Result<Vec<String>, StoreError>;

    // ─── Stats ───────────────────────────────────────────────────

    /// Overwrite a stat reached through the owner's players. Returns rows
    /// changed.
    async fn update_owned_stat(
        &self,
        stat_id: i64,
        owner_id: i64,
        stat: &NewStat,
    ) -> Result<u64, StoreError>;

    /// Delete a stat reached through the owner's players and return the game
    /// it belonged to, or `None` when not found for this owner.
    async fn delete_owned_stat(&self, stat_id: i64, owner_id: i64)
        -> Result<Option<i64>, StoreError>;
}
