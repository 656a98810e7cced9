// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ownership-scoped access to players, games and stats.
//!
//! Every operation starts from the verified caller email. Mutations re-read
//! the caller's trust flag from storage on each call, and target rows are
//! only ever reached through the caller's players.

use std::sync::Arc;

use crate::db::{GameDeletion, ListColumn, RecordedStats, StatScope, Store, StoreError};
use crate::error::{AppError, Result};
use crate::models::stat::MAX_NAME_LEN;
use crate::models::{Game, GameDetails, GameSummary, Installment, NewStat, Player, StatEntry, User};

/// Attempts at the resolve-or-create transaction before reporting a conflict.
pub const LAZY_CREATE_ATTEMPTS: usize = 3;

/// A stat submission as received from a client.
#[derive(Debug, Clone)]
pub struct StatSubmission {
    pub game: GameDetails,
    pub player_name: String,
    pub entries: Vec<StatEntry>,
}

/// Result of deleting a single stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatDeletion {
    pub game_id: i64,
    /// No stat references the game any more, from any user.
    pub last_stat_deleted: bool,
}

#[derive(Clone)]
pub struct StatsGateway {
    store: Arc<dyn Store>,
}

impl StatsGateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn caller(&self, email: &str) -> Result<User> {
        self.store
            .find_user(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn trusted_caller(&self, email: &str) -> Result<User> {
        let user = self.caller(email).await?;
        if !user.is_trusted {
            tracing::warn!(user_id = user.user_id, "Untrusted user attempted a mutation");
            return Err(AppError::Forbidden(
                "Only trusted users may modify data".to_string(),
            ));
        }
        Ok(user)
    }

    async fn caller_id(&self, email: &str) -> Result<Option<i64>> {
        Ok(self.store.find_user(email).await?.map(|u| u.user_id))
    }

    // ─── Stats ───────────────────────────────────────────────────

    /// Validate a submission and record its well-formed entries.
    pub async fn add_stats(&self, email: &str, submission: StatSubmission) -> Result<RecordedStats> {
        check_game(&submission.game)?;
        let player_name = submission.player_name.trim();
        if player_name.is_empty() {
            return Err(AppError::BadRequest("player_name is required".to_string()));
        }
        check_len("player_name", player_name)?;
        if submission.entries.is_empty() {
            return Err(AppError::BadRequest(
                "stats must be a non-empty list".to_string(),
            ));
        }

        let submitted = submission.entries.len();
        let stats: Vec<NewStat> = submission
            .entries
            .into_iter()
            .filter_map(|entry| match entry.normalize() {
                Ok(stat) => Some(stat),
                Err(reason) => {
                    tracing::debug!(%reason, "Skipping malformed stat entry");
                    None
                }
            })
            .collect();
        if stats.is_empty() {
            return Err(AppError::BadRequest(
                "No valid stat entries provided".to_string(),
            ));
        }

        let user = self.trusted_caller(email).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .store
                .record_stats(user.user_id, &submission.game, player_name, &stats)
                .await
            {
                Ok(recorded) => {
                    tracing::info!(
                        user_id = user.user_id,
                        game_id = recorded.game_id,
                        player_id = recorded.player_id,
                        inserted = recorded.inserted,
                        skipped = submitted - recorded.inserted,
                        game_created = recorded.game_created,
                        player_created = recorded.player_created,
                        "Recorded stats"
                    );
                    return Ok(recorded);
                }
                Err(StoreError::UniqueViolation { constraint }) if attempt < LAZY_CREATE_ATTEMPTS => {
                    tracing::debug!(%constraint, attempt, "Lazy create raced, retrying");
                }
                Err(StoreError::UniqueViolation { constraint }) => {
                    tracing::warn!(%constraint, attempt, "Lazy create kept conflicting");
                    return Err(AppError::Conflict(
                        "Concurrent update, please retry".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Overwrite one of the caller's stats.
    pub async fn update_stat(&self, email: &str, stat_id: i64, entry: StatEntry) -> Result<()> {
        let stat = entry
            .normalize()
            .map_err(|reason| AppError::BadRequest(reason.to_string()))?;
        let user = self.trusted_caller(email).await?;

        if self.store.update_owned_stat(stat_id, user.user_id, &stat).await? == 0 {
            return Err(AppError::NotFound("Stat not found".to_string()));
        }
        tracing::info!(user_id = user.user_id, stat_id, "Updated stat");
        Ok(())
    }

    /// Delete one of the caller's stats and report whether its game is now
    /// unreferenced.
    pub async fn delete_stat(&self, email: &str, stat_id: i64) -> Result<StatDeletion> {
        let user = self.trusted_caller(email).await?;

        let game_id = self
            .store
            .delete_owned_stat(stat_id, user.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Stat not found".to_string()))?;

        let last_stat_deleted = !self
            .store
            .game_has_stats(game_id, StatScope::Owner(user.user_id))
            .await?
            && !self.store.game_has_stats(game_id, StatScope::Any).await?;

        tracing::info!(
            user_id = user.user_id,
            stat_id,
            game_id,
            last_stat_deleted,
            "Deleted stat"
        );
        Ok(StatDeletion {
            game_id,
            last_stat_deleted,
        })
    }

    // ─── Players ─────────────────────────────────────────────────

    pub async fn update_player(&self, email: &str, player_id: i64, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(AppError::BadRequest("player_name is required".to_string()));
        }
        check_len("player_name", new_name)?;

        match self.store.rename_player(player_id, email, new_name).await {
            Ok(0) => Err(AppError::NotFound(
                "Player not found or not authorized".to_string(),
            )),
            Ok(_) => {
                tracing::info!(player_id, "Renamed player");
                Ok(())
            }
            Err(e) if e.is_unique_violation() => Err(AppError::Conflict(format!(
                "A player named '{}' already exists",
                new_name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a player with all of its stats. Returns the number of stats
    /// removed.
    pub async fn delete_player(&self, email: &str, player_id: i64) -> Result<u64> {
        let user = self.trusted_caller(email).await?;

        if !self.store.player_owned_by(player_id, user.user_id).await? {
            return Err(AppError::NotFound("Player not found".to_string()));
        }

        let stats_deleted = self
            .store
            .delete_player_cascade(player_id, user.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Player not found".to_string()))?;

        tracing::info!(user_id = user.user_id, player_id, stats_deleted, "Deleted player");
        Ok(stats_deleted)
    }

    pub async fn list_players(&self, email: &str) -> Result<Vec<Player>> {
        match self.caller_id(email).await? {
            Some(user_id) => Ok(self.store.list_players(user_id).await?),
            None => Ok(Vec::new()),
        }
    }

    // ─── Games ───────────────────────────────────────────────────

    pub async fn game_details(&self, email: &str, game_id: i64) -> Result<Game> {
        let user = self.caller(email).await?;
        self.store
            .find_game_with_owner_stats(game_id, user.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Game not found".to_string()))
    }

    pub async fn update_game(&self, email: &str, game_id: i64, details: GameDetails) -> Result<()> {
        check_game(&details)?;
        let user = self.trusted_caller(email).await?;

        if self
            .store
            .find_game_with_owner_stats(game_id, user.user_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Game not found".to_string()));
        }

        match self.store.update_game(game_id, &details).await {
            Ok(0) => Err(AppError::NotFound("Game not found".to_string())),
            Ok(_) => {
                tracing::info!(user_id = user.user_id, game_id, "Updated game");
                Ok(())
            }
            Err(e) if e.is_unique_violation() => Err(AppError::Conflict(
                "A game with this name and installment already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a game nobody has stats on.
    pub async fn delete_game(&self, email: &str, game_id: i64) -> Result<()> {
        let user = self.trusted_caller(email).await?;

        match self.store.delete_unreferenced_game(game_id).await? {
            GameDeletion::Deleted => {
                tracing::info!(user_id = user.user_id, game_id, "Deleted game");
                Ok(())
            }
            GameDeletion::Referenced => {
                tracing::warn!(game_id, "Refused to delete a game that still has stats");
                Err(AppError::Conflict(
                    "Game still has stats and cannot be deleted".to_string(),
                ))
            }
            GameDeletion::Missing => Err(AppError::NotFound("Game not found".to_string())),
        }
    }

    pub async fn list_games(&self, email: &str) -> Result<Vec<GameSummary>> {
        match self.caller_id(email).await? {
            Some(user_id) => Ok(self.store.list_games(user_id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn list_franchises(&self, email: &str) -> Result<Vec<String>> {
        match self.caller_id(email).await? {
            Some(user_id) => Ok(self.store.list_franchises(user_id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn list_installments(&self, email: &str, franchise: &str) -> Result<Vec<Installment>> {
        match self.caller_id(email).await? {
            Some(user_id) => Ok(self.store.list_installments(user_id, franchise).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn list_ranks(&self, email: &str, game_id: i64) -> Result<Vec<String>> {
        match self.caller_id(email).await? {
            Some(user_id) => Ok(self.store.list_ranks(user_id, game_id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn list_game_modes(&self, email: &str, game_id: i64) -> Result<Vec<String>> {
        self.list_column(email, game_id, ListColumn::GameMode).await
    }

    pub async fn list_stat_types(&self, email: &str, game_id: i64) -> Result<Vec<String>> {
        self.list_column(email, game_id, ListColumn::StatType).await
    }

    async fn list_column(&self, email: &str, game_id: i64, column: ListColumn) -> Result<Vec<String>> {
        match self.caller_id(email).await? {
            Some(user_id) => Ok(self.store.list_stat_column(user_id, game_id, column).await?),
            None => Ok(Vec::new()),
        }
    }
}

fn check_len(field: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "{} exceeds {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Required name plus column limits on every game attribute.
fn check_game(details: &GameDetails) -> Result<()> {
    if details.name.is_empty() {
        return Err(AppError::BadRequest("game_name is required".to_string()));
    }
    check_len("game_name", &details.name)?;
    for (field, value) in [
        ("game_installment", &details.installment),
        ("game_genre", &details.genre),
        ("game_subgenre", &details.subgenre),
    ] {
        if let Some(value) = value {
            check_len(field, value)?;
        }
    }
    Ok(())
}
