// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recorded match statistics.
//!
//! Clients submit loosely-typed [`StatEntry`] values; only entries that
//! normalize into a [`NewStat`] are ever written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::game::non_blank;

pub const MAX_STAT_TYPE_LEN: usize = 50;
pub const MAX_RANK_LEN: usize = 50;
pub const MAX_GAME_MODE_LEN: usize = 255;
/// Player names and the game name, installment, genre and subgenre.
pub const MAX_NAME_LEN: usize = 255;

/// Stat row stored in `fact.game_stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Stat {
    pub stat_id: i64,
    pub game_id: i64,
    pub player_id: i64,
    pub stat_type: String,
    pub stat_value: i64,
    pub game_mode: Option<String>,
    pub game_level: Option<i32>,
    /// `Some(true)` win, `Some(false)` loss, `None` not applicable
    pub win: Option<bool>,
    pub ranked: Option<bool>,
    pub pre_match_rank_value: Option<String>,
    pub post_match_rank_value: Option<String>,
    pub played_at: DateTime<Utc>,
}

/// Result of a match, when the game has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Win,
    Loss,
}

impl MatchOutcome {
    /// Column encoding of an optional outcome.
    pub fn to_flag(outcome: Option<Self>) -> Option<bool> {
        outcome.map(|o| o == Self::Win)
    }

    pub fn from_flag(flag: Option<bool>) -> Option<Self> {
        flag.map(|won| if won { Self::Win } else { Self::Loss })
    }
}

/// Boolean flag as sent by clients: `1`/`0` or `true`/`false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn as_bool(self) -> Option<bool> {
        match self {
            Flag::Bool(b) => Some(b),
            Flag::Int(1) => Some(true),
            Flag::Int(0) => Some(false),
            Flag::Int(_) => None,
        }
    }
}

/// One stat entry as submitted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatEntry {
    #[serde(default)]
    pub stat_type: Option<String>,
    #[serde(default)]
    pub stat_value: Option<i64>,
    #[serde(default)]
    pub game_mode: Option<String>,
    #[serde(default)]
    pub game_level: Option<i32>,
    #[serde(default)]
    pub win: Option<Flag>,
    #[serde(default)]
    pub ranked: Option<Flag>,
    #[serde(default)]
    pub pre_match_rank_value: Option<String>,
    #[serde(default)]
    pub post_match_rank_value: Option<String>,
}

/// Why an entry was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryRejection {
    #[error("stat_type is required")]
    MissingType,
    #[error("stat_type exceeds {MAX_STAT_TYPE_LEN} characters")]
    TypeTooLong,
    #[error("stat_value is required")]
    MissingValue,
    #[error("win must be 1, 0 or null")]
    InvalidWin,
    #[error("ranked must be 1, 0 or null")]
    InvalidRanked,
    #[error("rank values are limited to {MAX_RANK_LEN} characters")]
    RankTooLong,
    #[error("game_mode exceeds {MAX_GAME_MODE_LEN} characters")]
    ModeTooLong,
}

/// A validated stat ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStat {
    pub stat_type: String,
    pub stat_value: i64,
    pub game_mode: Option<String>,
    pub game_level: Option<i32>,
    pub outcome: Option<MatchOutcome>,
    pub ranked: Option<bool>,
    pub pre_match_rank: Option<String>,
    pub post_match_rank: Option<String>,
}

impl StatEntry {
    /// Validate and normalize this entry.
    pub fn normalize(self) -> Result<NewStat, EntryRejection> {
        let stat_type = non_blank(self.stat_type).ok_or(EntryRejection::MissingType)?;
        if stat_type.chars().count() > MAX_STAT_TYPE_LEN {
            return Err(EntryRejection::TypeTooLong);
        }
        let stat_value = self.stat_value.ok_or(EntryRejection::MissingValue)?;

        let outcome = match self.win {
            None => None,
            Some(flag) => Some(
                MatchOutcome::from_flag(flag.as_bool()).ok_or(EntryRejection::InvalidWin)?,
            ),
        };
        let ranked = match self.ranked {
            None => None,
            Some(flag) => Some(flag.as_bool().ok_or(EntryRejection::InvalidRanked)?),
        };

        let game_mode = non_blank(self.game_mode);
        if game_mode
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_GAME_MODE_LEN)
        {
            return Err(EntryRejection::ModeTooLong);
        }

        let pre_match_rank = non_blank(self.pre_match_rank_value);
        let post_match_rank = non_blank(self.post_match_rank_value);
        if [&pre_match_rank, &post_match_rank]
            .iter()
            .any(|r| r.as_ref().is_some_and(|r| r.chars().count() > MAX_RANK_LEN))
        {
            return Err(EntryRejection::RankTooLong);
        }

        Ok(NewStat {
            stat_type,
            stat_value,
            game_mode,
            game_level: self.game_level,
            outcome,
            ranked,
            pre_match_rank,
            post_match_rank,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(json: serde_json::Value) -> StatEntry {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_full_entry_normalizes() {
        let stat = entry(serde_json::json!({
            "stat_type": " Eliminations ",
            "stat_value": 15,
            "game_mode": "TDM",
            "game_level": 5,
            "win": 1,
            "ranked": true,
            "pre_match_rank_value": "Gold",
            "post_match_rank_value": "Platinum"
        }))
        .normalize()
        .unwrap();

        assert_eq!(stat.stat_type, "Eliminations");
        assert_eq!(stat.outcome, Some(MatchOutcome::Win));
        assert_eq!(stat.ranked, Some(true));
        assert_eq!(stat.post_match_rank.as_deref(), Some("Platinum"));
    }

    #[test]
    fn test_zero_value_is_present() {
        let stat = entry(serde_json::json!({"stat_type": "Deaths", "stat_value": 0, "win": 0}))
            .normalize()
            .unwrap();
        assert_eq!(stat.stat_value, 0);
        assert_eq!(stat.outcome, Some(MatchOutcome::Loss));
    }

    #[test]
    fn test_rejections() {
        let cases = [
            (serde_json::json!({"stat_type": "", "stat_value": 1}), EntryRejection::MissingType),
            (serde_json::json!({"stat_value": 1}), EntryRejection::MissingType),
            (serde_json::json!({"stat_type": "Kills"}), EntryRejection::MissingValue),
            (
                serde_json::json!({"stat_type": "Kills", "stat_value": null}),
                EntryRejection::MissingValue,
            ),
            (
                serde_json::json!({"stat_type": "Kills", "stat_value": 1, "win": 3}),
                EntryRejection::InvalidWin,
            ),
            (
                serde_json::json!({"stat_type": "x".repeat(51), "stat_value": 1}),
                EntryRejection::TypeTooLong,
            ),
        ];

        for (json, expected) in cases {
            assert_eq!(entry(json).normalize().unwrap_err(), expected);
        }
    }

    #[test]
    fn test_outcome_flag_encoding() {
        assert_eq!(MatchOutcome::to_flag(Some(MatchOutcome::Win)), Some(true));
        assert_eq!(MatchOutcome::to_flag(Some(MatchOutcome::Loss)), Some(false));
        assert_eq!(MatchOutcome::to_flag(None), None);
        assert_eq!(MatchOutcome::from_flag(Some(false)), Some(MatchOutcome::Loss));
    }
}
