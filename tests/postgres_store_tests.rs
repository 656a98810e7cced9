// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL adapter tests.
//!
//! Run against a scratch database:
//! `TEST_DATABASE_URL=postgres://localhost/game_stats_test cargo test --test postgres_store_tests`
//! Each test uses its own email domain so tests can share one database.

use game_stats_tracker::db::{GameDeletion, ListColumn, PgStore, StatScope, Store};
use game_stats_tracker::models::{GameDetails, MatchOutcome, NewStat};
use sqlx::postgres::PgPool;
use std::time::{SystemTime, UNIX_EPOCH};

#[macro_use]
mod common;

/// Suffix that keeps names from colliding between runs.
fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", std::process::id(), nanos)
}

async fn store(url: &str) -> PgStore {
    let store = PgStore::connect(url, 2).await.expect("connect to test database");
    store.migrate().await.expect("apply migrations");
    store
}

fn stat(stat_type: &str, value: i64, ranked: Option<bool>, pre: Option<&str>) -> NewStat {
    NewStat {
        stat_type: stat_type.to_string(),
        stat_value: value,
        game_mode: Some("Slayer".to_string()),
        game_level: None,
        outcome: Some(MatchOutcome::Win),
        ranked,
        pre_match_rank: pre.map(str::to_string),
        post_match_rank: None,
    }
}

#[tokio::test]
async fn test_user_unique_email() {
    let url = require_database!();
    let store = store(&url).await;
    let email = format!("u-{}@pg.test", unique_suffix());

    let user = store.insert_user(&email, false).await.unwrap();
    let err = store.insert_user(&email, true).await.unwrap_err();
    assert!(err.is_unique_violation());

    store.set_user_trust(user.user_id, true).await.unwrap();
    assert!(store.find_user(&email).await.unwrap().unwrap().is_trusted);
}

#[tokio::test]
async fn test_record_stats_null_installment_key() {
    let url = require_database!();
    let store = store(&url).await;
    let suffix = unique_suffix();
    let user = store
        .insert_user(&format!("r-{}@pg.test", suffix), true)
        .await
        .unwrap();
    let name = format!("Foo {}", suffix);

    let main = GameDetails::new(name.clone(), None, None, None);
    let first = store
        .record_stats(user.user_id, &main, "P1", &[stat("Kills", 1, None, None)])
        .await
        .unwrap();
    let second = store
        .record_stats(user.user_id, &main, "P1", &[stat("Kills", 2, None, None)])
        .await
        .unwrap();
    let dlc = GameDetails::new(name.clone(), Some("DLC".to_string()), None, None);
    let third = store
        .record_stats(user.user_id, &dlc, "P1", &[stat("Kills", 3, None, None)])
        .await
        .unwrap();

    assert!(first.game_created && first.player_created);
    assert_eq!(first.game_id, second.game_id);
    assert_eq!(first.player_id, second.player_id);
    assert_ne!(first.game_id, third.game_id);

    let installments = store.list_installments(user.user_id, &name).await.unwrap();
    assert_eq!(installments.len(), 2);
    assert_eq!(installments[0].game_installment, None);
}

#[tokio::test]
async fn test_ownership_scoped_lists_and_deletes() {
    let url = require_database!();
    let store = store(&url).await;
    let suffix = unique_suffix();
    let alice = store
        .insert_user(&format!("a-{}@pg.test", suffix), true)
        .await
        .unwrap();
    let bob = store
        .insert_user(&format!("b-{}@pg.test", suffix), true)
        .await
        .unwrap();
    let game = GameDetails::new(format!("Halo {}", suffix), None, None, None);

    let mine = store
        .record_stats(
            alice.user_id,
            &game,
            "Chief",
            &[
                stat("Kills", 5, Some(true), Some("Gold")),
                stat("Deaths", 2, Some(false), Some("Bronze")),
            ],
        )
        .await
        .unwrap();
    let theirs = store
        .record_stats(bob.user_id, &game, "Chief", &[stat("Kills", 1, None, None)])
        .await
        .unwrap();
    assert_eq!(mine.game_id, theirs.game_id);
    assert_ne!(mine.player_id, theirs.player_id);

    assert_eq!(
        store.list_ranks(alice.user_id, mine.game_id).await.unwrap(),
        vec!["Gold"]
    );
    assert_eq!(
        store
            .list_stat_column(alice.user_id, mine.game_id, ListColumn::StatType)
            .await
            .unwrap(),
        vec!["Deaths", "Kills"]
    );

    // Bob cannot touch Alice's player
    assert_eq!(
        store
            .rename_player(mine.player_id, &bob_email(&suffix), "x")
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        store
            .delete_player_cascade(mine.player_id, bob.user_id)
            .await
            .unwrap(),
        None
    );

    assert_eq!(
        store.delete_unreferenced_game(mine.game_id).await.unwrap(),
        GameDeletion::Referenced
    );

    assert_eq!(
        store
            .delete_player_cascade(mine.player_id, alice.user_id)
            .await
            .unwrap(),
        Some(2)
    );
    assert!(!store
        .game_has_stats(mine.game_id, StatScope::Owner(alice.user_id))
        .await
        .unwrap());
    assert!(store
        .game_has_stats(mine.game_id, StatScope::Any)
        .await
        .unwrap());
}

fn bob_email(suffix: &str) -> String {
    format!("b-{}@pg.test", suffix)
}

#[tokio::test]
async fn test_delete_owned_stat_and_orphaned_game() {
    let url = require_database!();
    let store = store(&url).await;
    let suffix = unique_suffix();
    let user = store
        .insert_user(&format!("d-{}@pg.test", suffix), true)
        .await
        .unwrap();
    let game = GameDetails::new(format!("Doom {}", suffix), None, None, None);
    let recorded = store
        .record_stats(user.user_id, &game, "Slayer", &[stat("Demons", 100, None, None)])
        .await
        .unwrap();

    let players = store.list_players(user.user_id).await.unwrap();
    assert_eq!(players.len(), 1);

    let found = store
        .find_game_with_owner_stats(recorded.game_id, user.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.game_name, game.name);

    let games = store.list_games(user.user_id).await.unwrap();
    assert_eq!(games.len(), 1);

    let pool = PgPool::connect(&url).await.unwrap();
    let stat_id: i64 = sqlx::query_scalar("SELECT stat_id FROM fact.game_stats WHERE game_id = $1")
        .bind(recorded.game_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    let stranger = store
        .insert_user(&format!("s-{}@pg.test", suffix), true)
        .await
        .unwrap();
    assert_eq!(
        store.delete_owned_stat(stat_id, stranger.user_id).await.unwrap(),
        None
    );
    assert_eq!(
        store.delete_owned_stat(stat_id, user.user_id).await.unwrap(),
        Some(recorded.game_id)
    );

    assert_eq!(
        store.delete_unreferenced_game(recorded.game_id).await.unwrap(),
        GameDeletion::Deleted
    );
    assert_eq!(
        store.delete_unreferenced_game(recorded.game_id).await.unwrap(),
        GameDeletion::Missing
    );
}
