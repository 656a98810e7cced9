// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store.
//!
//! Mirrors the PostgreSQL schema closely enough to run the gateway and the
//! HTTP layer without a database. Multi-step writes operate on a copy of
//! the tables that replaces the original only once every step succeeded.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{
    constraints, GameDeletion, ListColumn, RecordedStats, StatScope, Store, StoreError,
};
use crate::models::stat::MatchOutcome;
use crate::models::{Game, GameDetails, GameSummary, Installment, NewStat, Player, Stat, User};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    games: Vec<Game>,
    players: Vec<Player>,
    stats: Vec<Stat>,
    next_id: i64,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn owns_player(&self, player_id: i64, owner_id: i64) -> bool {
        self.players
            .iter()
            .any(|p| p.player_id == player_id && p.user_id == owner_id)
    }

    /// Stats reached through the owner's players.
    fn owner_stats(&self, owner_id: i64) -> impl Iterator<Item = &Stat> {
        self.stats
            .iter()
            .filter(move |s| self.owns_player(s.player_id, owner_id))
    }

    fn owner_game_ids(&self, owner_id: i64) -> BTreeSet<i64> {
        self.owner_stats(owner_id).map(|s| s.game_id).collect()
    }
}

/// Mutex-guarded tables, shared by clones of the owning `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails as if the database were unreachable.
    pub fn offline() -> Self {
        Self {
            tables: Mutex::default(),
            offline: true,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    /// Number of stat rows, across all users.
    pub fn stat_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.stats.len())
    }

    /// Number of game rows.
    pub fn game_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.games.len())
    }

    pub fn stat(&self, stat_id: i64) -> Result<Option<Stat>, StoreError> {
        Ok(self
            .lock()?
            .stats
            .iter()
            .find(|s| s.stat_id == stat_id)
            .cloned())
    }

    /// Stats of one game, in insertion order.
    pub fn stats_for_game(&self, game_id: i64) -> Result<Vec<Stat>, StoreError> {
        Ok(self
            .lock()?
            .stats
            .iter()
            .filter(|s| s.game_id == game_id)
            .cloned()
            .collect())
    }
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    // ─── Users ───────────────────────────────────────────────────

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, email: &str, is_trusted: bool) -> Result<User, StoreError> {
        let mut tables = self.lock()?;
        if tables.users.iter().any(|u| u.email == email) {
            return Err(unique_violation(constraints::USER_EMAIL));
        }
        let user = User {
            user_id: tables.allocate_id(),
            email: email.to_string(),
            is_trusted,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn set_user_trust(&self, user_id: i64, is_trusted: bool) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if let Some(user) = tables.users.iter_mut().find(|u| u.user_id == user_id) {
            user.is_trusted = is_trusted;
        }
        Ok(())
    }

    // ─── Stats submission ────────────────────────────────────────

    async fn record_stats(
        &self,
        owner_id: i64,
        game: &GameDetails,
        player_name: &str,
        stats: &[NewStat],
    ) -> Result<RecordedStats, StoreError> {
        let mut tables = self.lock()?;
        let mut draft = tables.clone();
        let now = Utc::now();

        let installment = game.installment.as_deref();
        let existing = draft
            .games
            .iter()
            .position(|g| g.matches_key(&game.name, installment));
        let (game_id, game_created) = match existing {
            Some(index) => {
                let existing = &mut draft.games[index];
                existing.last_played_at = now;
                (existing.game_id, false)
            }
            None => {
                let game_id = draft.allocate_id();
                draft.games.push(Game {
                    game_id,
                    game_name: game.name.clone(),
                    game_installment: game.installment.clone(),
                    game_genre: game.genre.clone(),
                    game_subgenre: game.subgenre.clone(),
                    created_at: now,
                    last_played_at: now,
                });
                (game_id, true)
            }
        };

        let existing = draft
            .players
            .iter()
            .find(|p| p.player_name == player_name && p.user_id == owner_id)
            .map(|p| p.player_id);
        let (player_id, player_created) = match existing {
            Some(player_id) => (player_id, false),
            None => {
                let player_id = draft.allocate_id();
                draft.players.push(Player {
                    player_id,
                    player_name: player_name.to_string(),
                    user_id: owner_id,
                });
                (player_id, true)
            }
        };

        for stat in stats {
            let stat_id = draft.allocate_id();
            draft.stats.push(Stat {
                stat_id,
                game_id,
                player_id,
                stat_type: stat.stat_type.clone(),
                stat_value: stat.stat_value,
                game_mode: stat.game_mode.clone(),
                game_level: stat.game_level,
                win: MatchOutcome::to_flag(stat.outcome),
                ranked: stat.ranked,
                pre_match_rank_value: stat.pre_match_rank.clone(),
                post_match_rank_value: stat.post_match_rank.clone(),
                played_at: now,
            });
        }

        *tables = draft;
        Ok(RecordedStats {
            game_id,
            player_id,
            inserted: stats.len(),
            game_created,
            player_created,
        })
    }

    // ─── Players ─────────────────────────────────────────────────

    async fn rename_player(
        &self,
        player_id: i64,
        owner_email: &str,
        new_name: &str,
    ) -> Result<u64, StoreError> {
        let mut tables = self.lock()?;
        let Some(owner_id) = tables
            .users
            .iter()
            .find(|u| u.email == owner_email && u.is_trusted)
            .map(|u| u.user_id)
        else {
            return Ok(0);
        };
        if !tables.owns_player(player_id, owner_id) {
            return Ok(0);
        }
        if tables
            .players
            .iter()
            .any(|p| p.player_id != player_id && p.user_id == owner_id && p.player_name == new_name)
        {
            return Err(unique_violation(constraints::PLAYER_NAME_OWNER));
        }
        if let Some(player) = tables.players.iter_mut().find(|p| p.player_id == player_id) {
            player.player_name = new_name.to_string();
        }
        Ok(1)
    }

    async fn player_owned_by(&self, player_id: i64, owner_id: i64) -> Result<bool, StoreError> {
        Ok(self.lock()?.owns_player(player_id, owner_id))
    }

    async fn delete_player_cascade(
        &self,
        player_id: i64,
        owner_id: i64,
    ) -> Result<Option<u64>, StoreError> {
        let mut tables = self.lock()?;
        if !tables.owns_player(player_id, owner_id) {
            return Ok(None);
        }
        let before = tables.stats.len();
        tables.stats.retain(|s| s.player_id != player_id);
        let stats_deleted = (before - tables.stats.len()) as u64;
        tables.players.retain(|p| p.player_id != player_id);
        Ok(Some(stats_deleted))
    }

    async fn list_players(&self, owner_id: i64) -> Result<Vec<Player>, StoreError> {
        let tables = self.lock()?;
        let mut players: Vec<Player> = tables
            .players
            .iter()
            .filter(|p| p.user_id == owner_id)
            .cloned()
            .collect();
        players.sort_by(|a, b| {
            a.player_name
                .cmp(&b.player_name)
                .then(a.player_id.cmp(&b.player_id))
        });
        Ok(players)
    }

    // ─── Games ───────────────────────────────────────────────────

    async fn find_game_with_owner_stats(
        &self,
        game_id: i64,
        owner_id: i64,
    ) -> Result<Option<Game>, StoreError> {
        let tables = self.lock()?;
        if !tables.owner_game_ids(owner_id).contains(&game_id) {
            return Ok(None);
        }
        Ok(tables.games.iter().find(|g| g.game_id == game_id).cloned())
    }

    async fn update_game(&self, game_id: i64, details: &GameDetails) -> Result<u64, StoreError> {
        let mut tables = self.lock()?;
        if tables.games.iter().any(|g| {
            g.game_id != game_id && g.matches_key(&details.name, details.installment.as_deref())
        }) {
            return Err(unique_violation(constraints::GAME_NAME_INSTALLMENT));
        }
        let Some(game) = tables.games.iter_mut().find(|g| g.game_id == game_id) else {
            return Ok(0);
        };
        game.game_name = details.name.clone();
        game.game_installment = details.installment.clone();
        game.game_genre = details.genre.clone();
        game.game_subgenre = details.subgenre.clone();
        Ok(1)
    }

    async fn game_has_stats(&self, game_id: i64, scope: StatScope) -> Result<bool, StoreError> {
        let tables = self.lock()?;
        Ok(match scope {
            StatScope::Owner(owner_id) => tables.owner_stats(owner_id).any(|s| s.game_id == game_id),
            StatScope::Any => tables.stats.iter().any(|s| s.game_id == game_id),
        })
    }

    async fn delete_unreferenced_game(&self, game_id: i64) -> Result<GameDeletion, StoreError> {
        let mut tables = self.lock()?;
        if !tables.games.iter().any(|g| g.game_id == game_id) {
            return Ok(GameDeletion::Missing);
        }
        if tables.stats.iter().any(|s| s.game_id == game_id) {
            return Ok(GameDeletion::Referenced);
        }
        tables.games.retain(|g| g.game_id != game_id);
        Ok(GameDeletion::Deleted)
    }

    async fn list_games(&self, owner_id: i64) -> Result<Vec<GameSummary>, StoreError> {
        let tables = self.lock()?;
        let ids = tables.owner_game_ids(owner_id);
        let mut games: Vec<GameSummary> = tables
            .games
            .iter()
            .filter(|g| ids.contains(&g.game_id))
            .map(|g| GameSummary {
                game_id: g.game_id,
                game_name: g.game_name.clone(),
            })
            .collect();
        games.sort_by(|a, b| a.game_name.cmp(&b.game_name).then(a.game_id.cmp(&b.game_id)));
        Ok(games)
    }

    async fn list_franchises(&self, owner_id: i64) -> Result<Vec<String>, StoreError> {
        let tables = self.lock()?;
        let ids = tables.owner_game_ids(owner_id);
        let names: BTreeSet<String> = tables
            .games
            .iter()
            .filter(|g| ids.contains(&g.game_id))
            .map(|g| g.game_name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn list_installments(
        &self,
        owner_id: i64,
        franchise: &str,
    ) -> Result<Vec<Installment>, StoreError> {
        let tables = self.lock()?;
        let ids = tables.owner_game_ids(owner_id);
        let mut installments: Vec<Installment> = tables
            .games
            .iter()
            .filter(|g| g.game_name == franchise && ids.contains(&g.game_id))
            .map(|g| Installment {
                game_id: g.game_id,
                game_installment: g.game_installment.clone(),
            })
            .collect();
        // `None` sorts before every `Some`, which puts the main game first.
        installments.sort_by(|a, b| {
            a.game_installment
                .cmp(&b.game_installment)
                .then(a.game_id.cmp(&b.game_id))
        });
        Ok(installments)
    }

    async fn list_ranks(&self, owner_id: i64, game_id: i64) -> Result<Vec<String>, StoreError> {
        let tables = self.lock()?;
        let ranks: BTreeSet<String> = tables
            .owner_stats(owner_id)
            .filter(|s| s.game_id == game_id && s.ranked == Some(true))
            .flat_map(|s| {
                [
                    non_empty(&s.pre_match_rank_value),
                    non_empty(&s.post_match_rank_value),
                ]
            })
            .flatten()
            .collect();
        Ok(ranks.into_iter().collect())
    }

    async fn list_stat_column(
        &self,
        owner_id: i64,
        game_id: i64,
        column: ListColumn,
    ) -> Result<Vec<String>, StoreError> {
        let tables = self.lock()?;
        let values: BTreeSet<String> = tables
            .owner_stats(owner_id)
            .filter(|s| s.game_id == game_id)
            .filter_map(|s| match column {
                ListColumn::GameMode => non_empty(&s.game_mode),
                ListColumn::StatType => non_empty(&Some(s.stat_type.clone())),
            })
            .collect();
        Ok(values.into_iter().collect())
    }

    // ─── Stats ───────────────────────────────────────────────────

    async fn update_owned_stat(
        &self,
        stat_id: i64,
        owner_id: i64,
        stat: &NewStat,
    ) -> Result<u64, StoreError> {
        let mut tables = self.lock()?;
        let Some(player_id) = tables
            .stats
            .iter()
            .find(|s| s.stat_id == stat_id)
            .map(|s| s.player_id)
        else {
            return Ok(0);
        };
        if !tables.owns_player(player_id, owner_id) {
            return Ok(0);
        }
        if let Some(row) = tables.stats.iter_mut().find(|s| s.stat_id == stat_id) {
            row.stat_type = stat.stat_type.clone();
            row.stat_value = stat.stat_value;
            row.game_mode = stat.game_mode.clone();
            row.game_level = stat.game_level;
            row.win = MatchOutcome::to_flag(stat.outcome);
            row.ranked = stat.ranked;
            row.pre_match_rank_value = stat.pre_match_rank.clone();
            row.post_match_rank_value = stat.post_match_rank.clone();
        }
        Ok(1)
    }

    async fn delete_owned_stat(
        &self,
        stat_id: i64,
        owner_id: i64,
    ) -> Result<Option<i64>, StoreError> {
        let mut tables = self.lock()?;
        let Some(position) = tables
            .stats
            .iter()
            .position(|s| s.stat_id == stat_id && tables.owns_player(s.player_id, owner_id))
        else {
            return Ok(None);
        };
        Ok(Some(tables.stats.remove(position).game_id))
    }
}
