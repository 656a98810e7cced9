// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL adapter.
//!
//! Every operation borrows a pooled connection for its own duration only.
//! Multi-statement operations run inside a transaction that is rolled back
//! when dropped without a commit, so an early `?` never leaves partial writes.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::db::{GameDeletion, ListColumn, RecordedStats, StatScope, Store, StoreError};
use crate::models::stat::MatchOutcome;
use crate::models::{Game, GameDetails, GameSummary, Installment, NewStat, Player, User};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled PostgreSQL store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a bounded pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect to PostgreSQL: {}", e)))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Migration failed: {}", e)))?;
        tracing::info!("Schema migrations applied");
        Ok(())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::UniqueViolation {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            },
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ─── Users ───────────────────────────────────────────────────

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT user_id, user_email, is_trusted FROM dim.users WHERE user_email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_user(&self, email: &str, is_trusted: bool) -> Result<User, StoreError> {
        Ok(sqlx::query_as::<_, User>(
            r#"INSERT INTO dim.users (user_email, is_trusted)
               VALUES ($1, $2)
               RETURNING user_id, user_email, is_trusted"#,
        )
        .bind(email)
        .bind(is_trusted)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn set_user_trust(&self, user_id: i64, is_trusted: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE dim.users SET is_trusted = $1 WHERE user_id = $2")
            .bind(is_trusted)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
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
        let mut tx = self.pool.begin().await?;

        let existing_game: Option<i64> = sqlx::query_scalar(
            r#"SELECT game_id FROM dim.games
                WHERE game_name = $1
                  AND game_installment IS NOT DISTINCT FROM $2"#,
        )
        .bind(&game.name)
        .bind(game.installment.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        let (game_id, game_created) = match existing_game {
            Some(game_id) => {
                sqlx::query("UPDATE dim.games SET last_played_at = NOW() WHERE game_id = $1")
                    .bind(game_id)
                    .execute(&mut *tx)
                    .await?;
                (game_id, false)
            }
            None => {
                let game_id: i64 = sqlx::query_scalar(
                    r#"INSERT INTO dim.games
                           (game_name, game_installment, game_genre, game_subgenre)
                       VALUES ($1, $2, $3, $4)
                       RETURNING game_id"#,
                )
                .bind(&game.name)
                .bind(game.installment.as_deref())
                .bind(game.genre.as_deref())
                .bind(game.subgenre.as_deref())
                .fetch_one(&mut *tx)
                .await?;
                (game_id, true)
            }
        };

        let existing_player: Option<i64> = sqlx::query_scalar(
            "SELECT player_id FROM dim.players WHERE player_name = $1 AND user_id = $2",
        )
        .bind(player_name)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (player_id, player_created) = match existing_player {
            Some(player_id) => (player_id, false),
            None => {
                let player_id: i64 = sqlx::query_scalar(
                    "INSERT INTO dim.players (player_name, user_id) VALUES ($1, $2) RETURNING player_id",
                )
                .bind(player_name)
                .bind(owner_id)
                .fetch_one(&mut *tx)
                .await?;
                (player_id, true)
            }
        };

        for stat in stats {
            sqlx::query(
                r#"INSERT INTO fact.game_stats
                       (game_id, player_id, stat_type, stat_value, game_mode, game_level,
                        win, ranked, pre_match_rank_value, post_match_rank_value)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
            )
            .bind(game_id)
            .bind(player_id)
            .bind(&stat.stat_type)
            .bind(stat.stat_value)
            .bind(stat.game_mode.as_deref())
            .bind(stat.game_level)
            .bind(MatchOutcome::to_flag(stat.outcome))
            .bind(stat.ranked)
            .bind(stat.pre_match_rank.as_deref())
            .bind(stat.post_match_rank.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

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
        let result = sqlx::query(
            r#"UPDATE dim.players
                  SET player_name = $1
                WHERE player_id = $2
                  AND user_id = (SELECT user_id FROM dim.users
                                  WHERE user_email = $3 AND is_trusted = TRUE)"#,
        )
        .bind(new_name)
        .bind(player_id)
        .bind(owner_email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn player_owned_by(&self, player_id: i64, owner_id: i64) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM dim.players WHERE player_id = $1 AND user_id = $2)",
        )
        .bind(player_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_player_cascade(
        &self,
        player_id: i64,
        owner_id: i64,
    ) -> Result<Option<u64>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let stats_deleted = sqlx::query(
            r#"DELETE FROM fact.game_stats s
                USING dim.players p
                WHERE s.player_id = p.player_id
                  AND p.player_id = $1
                  AND p.user_id = $2"#,
        )
        .bind(player_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let players_deleted =
            sqlx::query("DELETE FROM dim.players WHERE player_id = $1 AND user_id = $2")
                .bind(player_id)
                .bind(owner_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        if players_deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(stats_deleted))
    }

    async fn list_players(&self, owner_id: i64) -> Result<Vec<Player>, StoreError> {
        Ok(sqlx::query_as::<_, Player>(
            r#"SELECT player_id, player_name, user_id
                 FROM dim.players
                WHERE user_id = $1
                ORDER BY player_name, player_id"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // ─── Games ───────────────────────────────────────────────────

    async fn find_game_with_owner_stats(
        &self,
        game_id: i64,
        owner_id: i64,
    ) -> Result<Option<Game>, StoreError> {
        Ok(sqlx::query_as::<_, Game>(
            r#"SELECT g.game_id, g.game_name, g.game_installment, g.game_genre,
                      g.game_subgenre, g.created_at, g.last_played_at
                 FROM dim.games g
                WHERE g.game_id = $1
                  AND EXISTS (
                      SELECT 1
                        FROM fact.game_stats s
                        JOIN dim.players p ON p.player_id = s.player_id
                       WHERE s.game_id = g.game_id
                         AND p.user_id = $2
                  )"#,
        )
        .bind(game_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_game(&self, game_id: i64, details: &GameDetails) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"UPDATE dim.games
                  SET game_name = $1, game_installment = $2,
                      game_genre = $3, game_subgenre = $4
                WHERE game_id = $5"#,
        )
        .bind(&details.name)
        .bind(details.installment.as_deref())
        .bind(details.genre.as_deref())
        .bind(details.subgenre.as_deref())
        .bind(game_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn game_has_stats(&self, game_id: i64, scope: StatScope) -> Result<bool, StoreError> {
        let exists = match scope {
            StatScope::Owner(owner_id) => {
                sqlx::query_scalar(
                    r#"SELECT EXISTS(
                           SELECT 1
                             FROM fact.game_stats s
                             JOIN dim.players p ON p.player_id = s.player_id
                            WHERE s.game_id = $1 AND p.user_id = $2
                       )"#,
                )
                .bind(game_id)
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?
            }
            StatScope::Any => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM fact.game_stats WHERE game_id = $1)",
                )
                .bind(game_id)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(exists)
    }

    async fn delete_unreferenced_game(&self, game_id: i64) -> Result<GameDeletion, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock blocks concurrent stat inserts referencing this game.
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT game_id FROM dim.games WHERE game_id = $1 FOR UPDATE")
                .bind(game_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(GameDeletion::Missing);
        }

        let referenced: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM fact.game_stats WHERE game_id = $1)")
                .bind(game_id)
                .fetch_one(&mut *tx)
                .await?;
        if referenced {
            return Ok(GameDeletion::Referenced);
        }

        sqlx::query("DELETE FROM dim.games WHERE game_id = $1")
            .bind(game_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(GameDeletion::Deleted)
    }

    async fn list_games(&self, owner_id: i64) -> Result<Vec<GameSummary>, StoreError> {
        Ok(sqlx::query_as::<_, GameSummary>(
            r#"SELECT DISTINCT g.game_id, g.game_name
                 FROM dim.games g
                 JOIN fact.game_stats s ON s.game_id = g.game_id
                 JOIN dim.players p ON p.player_id = s.player_id
                WHERE p.user_id = $1
                ORDER BY g.game_name, g.game_id"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_franchises(&self, owner_id: i64) -> Result<Vec<String>, StoreError> {
        Ok(sqlx::query_scalar(
            r#"SELECT DISTINCT g.game_name
                 FROM dim.games g
                 JOIN fact.game_stats s ON s.game_id = g.game_id
                 JOIN dim.players p ON p.player_id = s.player_id
                WHERE p.user_id = $1
                ORDER BY g.game_name"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_installments(
        &self,
        owner_id: i64,
        franchise: &str,
    ) -> Result<Vec<Installment>, StoreError> {
        Ok(sqlx::query_as::<_, Installment>(
            r#"SELECT DISTINCT g.game_id, g.game_installment
                 FROM dim.games g
                 JOIN fact.game_stats s ON s.game_id = g.game_id
                 JOIN dim.players p ON p.player_id = s.player_id
                WHERE p.user_id = $1
                  AND g.game_name = $2
                ORDER BY g.game_installment NULLS FIRST, g.game_id"#,
        )
        .bind(owner_id)
        .bind(franchise)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_ranks(&self, owner_id: i64, game_id: i64) -> Result<Vec<String>, StoreError> {
        Ok(sqlx::query_scalar(
            r#"SELECT DISTINCT rank_value
                 FROM (
                     SELECT s.pre_match_rank_value AS rank_value
                       FROM fact.game_stats s
                       JOIN dim.players p ON p.player_id = s.player_id
                      WHERE s.game_id = $1 AND p.user_id = $2 AND s.ranked
                     UNION
                     SELECT s.post_match_rank_value AS rank_value
                       FROM fact.game_stats s
                       JOIN dim.players p ON p.player_id = s.player_id
                      WHERE s.game_id = $1 AND p.user_id = $2 AND s.ranked
                 ) AS ranks
                WHERE rank_value IS NOT NULL AND rank_value <> ''
                ORDER BY rank_value"#,
        )
        .bind(game_id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_stat_column(
        &self,
        owner_id: i64,
        game_id: i64,
        column: ListColumn,
    ) -> Result<Vec<String>, StoreError> {
        let column = match column {
            ListColumn::GameMode => "game_mode",
            ListColumn::StatType => "stat_type",
        };
        let sql = format!(
            r#"SELECT DISTINCT s.{column}
                 FROM fact.game_stats s
                 JOIN dim.players p ON p.player_id = s.player_id
                WHERE s.game_id = $1 AND p.user_id = $2
                  AND s.{column} IS NOT NULL AND s.{column} <> ''
                ORDER BY s.{column}"#
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(game_id)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?)
    }

    // ─── Stats ───────────────────────────────────────────────────

    async fn update_owned_stat(
        &self,
        stat_id: i64,
        owner_id: i64,
        stat: &NewStat,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"UPDATE fact.game_stats s
                  SET stat_type = $1, stat_value = $2, game_mode = $3, game_level = $4,
                      win = $5, ranked = $6,
                      pre_match_rank_value = $7, post_match_rank_value = $8
                 FROM dim.players p
                WHERE s.player_id = p.player_id
                  AND s.stat_id = $9
                  AND p.user_id = $10"#,
        )
        .bind(&stat.stat_type)
        .bind(stat.stat_value)
        .bind(stat.game_mode.as_deref())
        .bind(stat.game_level)
        .bind(MatchOutcome::to_flag(stat.outcome))
        .bind(stat.ranked)
        .bind(stat.pre_match_rank.as_deref())
        .bind(stat.post_match_rank.as_deref())
        .bind(stat_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_owned_stat(
        &self,
        stat_id: i64,
        owner_id: i64,
    ) -> Result<Option<i64>, StoreError> {
        Ok(sqlx::query_scalar(
            r#"DELETE FROM fact.game_stats s
                USING dim.players p
                WHERE s.player_id = p.player_id
                  AND s.stat_id = $1
                  AND p.user_id = $2
            RETURNING s.game_id"#,
        )
        .bind(stat_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
