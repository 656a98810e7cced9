// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{GameDetails, StatEntry};
use crate::routes::auth::MessageResponse;
use crate::services::gateway::StatSubmission;
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;
type IdPath = std::result::Result<Path<i64>, PathRejection>;

/// API routes (require authentication via bearer credential).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/add_stats", post(add_stats))
        .route("/api/update_stats/{id}", put(update_stats))
        .route("/api/delete_stats/{id}", delete(delete_stats))
        .route("/api/update_player/{id}", put(update_player))
        .route("/api/delete_player/{id}", delete(delete_player))
        .route("/api/get_players", get(get_players))
        .route("/api/get_game_details/{id}", get(get_game_details))
        .route("/api/update_game/{id}", put(update_game))
        .route("/api/delete_game/{id}", delete(delete_game))
        .route("/api/get_games", get(get_games))
        .route("/api/get_game_ranks/{id}", get(get_game_ranks))
        .route("/api/get_game_modes/{id}", get(get_game_modes))
        .route("/api/get_game_stat_types/{id}", get(get_game_stat_types))
        .route("/api/get_game_franchises", get(get_game_franchises))
        .route(
            "/api/get_game_installments/{*franchise}",
            get(get_game_installments),
        )
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

// ─── Stats ───────────────────────────────────────────────────

/// Game attributes as sent by clients. `game_series` is an older name for
/// the installment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameFields {
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default, alias = "game_series")]
    pub game_installment: Option<String>,
    #[serde(default)]
    pub game_genre: Option<String>,
    #[serde(default)]
    pub game_subgenre: Option<String>,
}

impl GameFields {
    fn into_details(self) -> GameDetails {
        GameDetails::new(
            self.game_name.unwrap_or_default(),
            self.game_installment,
            self.game_genre,
            self.game_subgenre,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddStatsRequest {
    #[serde(flatten)]
    pub game: GameFields,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub stats: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct AddStatsResponse {
    pub message: String,
    pub inserted: usize,
    pub game_id: i64,
    pub player_id: i64,
}

/// Record a batch of stats. Entries that do not parse are skipped.
async fn add_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: JsonBody<AddStatsRequest>,
) -> Result<(StatusCode, Json<AddStatsResponse>)> {
    let Json(request) = payload?;

    let entries = request
        .stats
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| serde_json::from_value::<StatEntry>(value).ok())
        .collect();

    let submission = StatSubmission {
        game: request.game.into_details(),
        player_name: request.player_name.unwrap_or_default(),
        entries,
    };

    let recorded = state.gateway.add_stats(&user.email, submission).await?;

    Ok((
        StatusCode::CREATED,
        Json(AddStatsResponse {
            message: format!("{} stats added successfully", recorded.inserted),
            inserted: recorded.inserted,
            game_id: recorded.game_id,
            player_id: recorded.player_id,
        }),
    ))
}

async fn update_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
    payload: JsonBody<serde_json::Value>,
) -> Result<Json<MessageResponse>> {
    let Path(stat_id) = id?;
    let Json(value) = payload?;
    let entry: StatEntry = serde_json::from_value(value)
        .map_err(|e| AppError::BadRequest(format!("Invalid stat: {}", e)))?;

    state.gateway.update_stat(&user.email, stat_id, entry).await?;
    Ok(message("Stat updated successfully"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct DeleteStatResponse {
    pub message: String,
    /// No stats reference the game any more; the client may offer to delete it.
    pub last_stat_deleted: bool,
    pub game_id: i64,
}

async fn delete_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
) -> Result<Json<DeleteStatResponse>> {
    let Path(stat_id) = id?;
    let deletion = state.gateway.delete_stat(&user.email, stat_id).await?;

    Ok(Json(DeleteStatResponse {
        message: "Stat deleted successfully".to_string(),
        last_stat_deleted: deletion.last_stat_deleted,
        game_id: deletion.game_id,
    }))
}

// ─── Players ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePlayerRequest {
    #[serde(default)]
    pub player_name: Option<String>,
}

async fn update_player(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
    payload: JsonBody<UpdatePlayerRequest>,
) -> Result<Json<MessageResponse>> {
    let Path(player_id) = id?;
    let Json(request) = payload?;
    let new_name = request.player_name.unwrap_or_default();

    state
        .gateway
        .update_player(&user.email, player_id, &new_name)
        .await?;
    Ok(message("Player updated successfully"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct DeletePlayerResponse {
    pub message: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub stats_deleted: u64,
}

async fn delete_player(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
) -> Result<Json<DeletePlayerResponse>> {
    let Path(player_id) = id?;
    let stats_deleted = state.gateway.delete_player(&user.email, player_id).await?;

    Ok(Json(DeletePlayerResponse {
        message: format!("Player and {} associated stats deleted", stats_deleted),
        stats_deleted,
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct PlayerItem {
    pub player_id: i64,
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct PlayersResponse {
    pub players: Vec<PlayerItem>,
}

async fn get_players(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PlayersResponse>> {
    let players = state
        .gateway
        .list_players(&user.email)
        .await?
        .into_iter()
        .map(|p| PlayerItem {
            player_id: p.player_id,
            player_name: p.player_name,
        })
        .collect();

    Ok(Json(PlayersResponse { players }))
}

// ─── Games ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct GameDetailsResponse {
    pub game_id: i64,
    pub game_name: String,
    pub game_installment: Option<String>,
    pub game_genre: Option<String>,
    pub game_subgenre: Option<String>,
}

async fn get_game_details(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
) -> Result<Json<GameDetailsResponse>> {
    let Path(game_id) = id?;
    let game = state.gateway.game_details(&user.email, game_id).await?;

    Ok(Json(GameDetailsResponse {
        game_id: game.game_id,
        game_name: game.game_name,
        game_installment: game.game_installment,
        game_genre: game.game_genre,
        game_subgenre: game.game_subgenre,
    }))
}

async fn update_game(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
    payload: JsonBody<GameFields>,
) -> Result<Json<MessageResponse>> {
    let Path(game_id) = id?;
    let Json(fields) = payload?;

    state
        .gateway
        .update_game(&user.email, game_id, fields.into_details())
        .await?;
    Ok(message("Game updated successfully"))
}

async fn delete_game(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
) -> Result<Json<MessageResponse>> {
    let Path(game_id) = id?;
    state.gateway.delete_game(&user.email, game_id).await?;
    Ok(message("Game deleted successfully"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct GameItem {
    pub game_id: i64,
    pub game_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct GamesResponse {
    pub games: Vec<GameItem>,
}

async fn get_games(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<GamesResponse>> {
    let games = state
        .gateway
        .list_games(&user.email)
        .await?
        .into_iter()
        .map(|g| GameItem {
            game_id: g.game_id,
            game_name: g.game_name,
        })
        .collect();

    Ok(Json(GamesResponse { games }))
}

// ─── Per-game lists ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RanksResponse {
    pub ranks: Vec<String>,
}

async fn get_game_ranks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
) -> Result<Json<RanksResponse>> {
    let Path(game_id) = id?;
    let ranks = state.gateway.list_ranks(&user.email, game_id).await?;
    Ok(Json(RanksResponse { ranks }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameModesResponse {
    pub game_modes: Vec<String>,
}

async fn get_game_modes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
) -> Result<Json<GameModesResponse>> {
    let Path(game_id) = id?;
    let game_modes = state.gateway.list_game_modes(&user.email, game_id).await?;
    Ok(Json(GameModesResponse { game_modes }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatTypesResponse {
    pub stat_types: Vec<String>,
}

async fn get_game_stat_types(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: IdPath,
) -> Result<Json<StatTypesResponse>> {
    let Path(game_id) = id?;
    let stat_types = state.gateway.list_stat_types(&user.email, game_id).await?;
    Ok(Json(StatTypesResponse { stat_types }))
}

// ─── Franchises ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FranchisesResponse {
    pub game_franchises: Vec<String>,
}

async fn get_game_franchises(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<FranchisesResponse>> {
    let game_franchises = state.gateway.list_franchises(&user.email).await?;
    Ok(Json(FranchisesResponse { game_franchises }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct InstallmentItem {
    pub game_id: i64,
    /// The installment, or "(Main Game)" when the game has none
    pub installment_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct InstallmentsResponse {
    pub game_installments: Vec<InstallmentItem>,
}

async fn get_game_installments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(franchise): Path<String>,
) -> Result<Json<InstallmentsResponse>> {
    let game_installments = state
        .gateway
        .list_installments(&user.email, &franchise)
        .await?
        .into_iter()
        .map(|i| InstallmentItem {
            game_id: i.game_id,
            installment_name: i.display_name(),
        })
        .collect();

    Ok(Json(InstallmentsResponse { game_installments }))
}
