//! Player profiles, each owned by exactly one user.

use serde::{Deserialize, Serialize};

/// Player row stored in `dim.players`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Player {
    pub player_id: i64,
    pub player_name: String,
    /// Owning user
    pub user_id: i64,
}
