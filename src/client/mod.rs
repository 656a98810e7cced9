// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed HTTP client for the tracker API.
//!
//! [`TrackerClient`] covers every route and doubles as the backend of the
//! [`session::SessionReconciler`].

pub mod session;

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::middleware::api_key::API_KEY_HEADER;
use crate::models::StatEntry;
use crate::routes::api::{
    AddStatsRequest, AddStatsResponse, DeletePlayerResponse, DeleteStatResponse, FranchisesResponse,
    GameDetailsResponse, GameFields, GameItem, GameModesResponse, GamesResponse, InstallmentItem,
    InstallmentsResponse, PlayerItem, PlayersResponse, RanksResponse, StatTypesResponse,
    UpdatePlayerRequest,
};
use crate::routes::auth::{EmailRequest, LoginResponse, MessageResponse, TrustOverrideRequest};
use crate::routes::HealthResponse;
use session::SessionBackend;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// True when the server refused the bearer credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Api { status: 401, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// A batch of stats for one game and player.
#[derive(Debug, Clone, Default)]
pub struct StatsBatch {
    pub game_name: String,
    pub game_installment: Option<String>,
    pub game_genre: Option<String>,
    pub game_subgenre: Option<String>,
    pub player_name: String,
    pub stats: Vec<StatEntry>,
}

#[derive(Clone)]
pub struct TrackerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TrackerClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building tracker HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn keyed(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn bearer(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.request(method, path).bearer_auth(token)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), code = %body.error, "API request failed");
        Err(ClientError::Api {
            status: status.as_u16(),
            code: body.error,
            message: body.message,
        })
    }

    // ─── Health ──────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.send(self.request(Method::GET, "/health")).await
    }

    pub async fn db_health(&self) -> Result<HealthResponse, ClientError> {
        self.send(self.request(Method::GET, "/db_health")).await
    }

    // ─── Identity ────────────────────────────────────────────────

    pub async fn login(&self, email: &str) -> Result<LoginResponse, ClientError> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.send(self.keyed("/api/login").json(&body)).await
    }

    pub async fn add_user(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.send(self.keyed("/api/add_user").json(&body)).await
    }

    pub async fn add_trusted_user(
        &self,
        email: &str,
        is_trusted: bool,
    ) -> Result<MessageResponse, ClientError> {
        let body = TrustOverrideRequest {
            email: email.to_string(),
            is_trusted,
        };
        self.send(self.keyed("/api/add_trusted_user").json(&body)).await
    }

    // ─── Stats ───────────────────────────────────────────────────

    pub async fn add_stats(
        &self,
        token: &str,
        batch: &StatsBatch,
    ) -> Result<AddStatsResponse, ClientError> {
        let stats = batch
            .stats
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .context("failed encoding stat entries")?;
        let body = AddStatsRequest {
            game: GameFields {
                game_name: Some(batch.game_name.clone()),
                game_installment: batch.game_installment.clone(),
                game_genre: batch.game_genre.clone(),
                game_subgenre: batch.game_subgenre.clone(),
            },
            player_name: Some(batch.player_name.clone()),
            stats: Some(stats),
        };
        self.send(self.bearer(Method::POST, "/api/add_stats", token).json(&body))
            .await
    }

    pub async fn update_stat(
        &self,
        token: &str,
        stat_id: i64,
        entry: &StatEntry,
    ) -> Result<MessageResponse, ClientError> {
        let path = format!("/api/update_stats/{}", stat_id);
        self.send(self.bearer(Method::PUT, &path, token).json(entry))
            .await
    }

    pub async fn delete_stat(
        &self,
        token: &str,
        stat_id: i64,
    ) -> Result<DeleteStatResponse, ClientError> {
        let path = format!("/api/delete_stats/{}", stat_id);
        self.send(self.bearer(Method::DELETE, &path, token)).await
    }

    // ─── Players ─────────────────────────────────────────────────

    pub async fn update_player(
        &self,
        token: &str,
        player_id: i64,
        player_name: &str,
    ) -> Result<MessageResponse, ClientError> {
        let path = format!("/api/update_player/{}", player_id);
        let body = UpdatePlayerRequest {
            player_name: Some(player_name.to_string()),
        };
        self.send(self.bearer(Method::PUT, &path, token).json(&body))
            .await
    }

    pub async fn delete_player(
        &self,
        token: &str,
        player_id: i64,
    ) -> Result<DeletePlayerResponse, ClientError> {
        let path = format!("/api/delete_player/{}", player_id);
        self.send(self.bearer(Method::DELETE, &path, token)).await
    }

    pub async fn players(&self, token: &str) -> Result<Vec<PlayerItem>, ClientError> {
        let response: PlayersResponse = self
            .send(self.bearer(Method::GET, "/api/get_players", token))
            .await?;
        Ok(response.players)
    }

    // ─── Games ───────────────────────────────────────────────────

    pub async fn game_details(
        &self,
        token: &str,
        game_id: i64,
    ) -> Result<GameDetailsResponse, ClientError> {
        let path = format!("/api/get_game_details/{}", game_id);
        self.send(self.bearer(Method::GET, &path, token)).await
    }

    pub async fn update_game(
        &self,
        token: &str,
        game_id: i64,
        fields: &GameFields,
    ) -> Result<MessageResponse, ClientError> {
        let path = format!("/api/update_game/{}", game_id);
        self.send(self.bearer(Method::PUT, &path, token).json(fields))
            .await
    }

    pub async fn delete_game(&self, token: &str, game_id: i64) -> Result<MessageResponse, ClientError> {
        let path = format!("/api/delete_game/{}", game_id);
        self.send(self.bearer(Method::DELETE, &path, token)).await
    }

    pub async fn games(&self, token: &str) -> Result<Vec<GameItem>, ClientError> {
        let response: GamesResponse = self
            .send(self.bearer(Method::GET, "/api/get_games", token))
            .await?;
        Ok(response.games)
    }

    pub async fn game_ranks(&self, token: &str, game_id: i64) -> Result<Vec<String>, ClientError> {
        let path = format!("/api/get_game_ranks/{}", game_id);
        let response: RanksResponse = self.send(self.bearer(Method::GET, &path, token)).await?;
        Ok(response.ranks)
    }

    pub async fn game_modes(&self, token: &str, game_id: i64) -> Result<Vec<String>, ClientError> {
        let path = format!("/api/get_game_modes/{}", game_id);
        let response: GameModesResponse = self.send(self.bearer(Method::GET, &path, token)).await?;
        Ok(response.game_modes)
    }

    pub async fn stat_types(&self, token: &str, game_id: i64) -> Result<Vec<String>, ClientError> {
        let path = format!("/api/get_game_stat_types/{}", game_id);
        let response: StatTypesResponse = self.send(self.bearer(Method::GET, &path, token)).await?;
        Ok(response.stat_types)
    }

    pub async fn franchises(&self, token: &str) -> Result<Vec<String>, ClientError> {
        let response: FranchisesResponse = self
            .send(self.bearer(Method::GET, "/api/get_game_franchises", token))
            .await?;
        Ok(response.game_franchises)
    }

    pub async fn installments(
        &self,
        token: &str,
        franchise: &str,
    ) -> Result<Vec<InstallmentItem>, ClientError> {
        let path = format!(
            "/api/get_game_installments/{}",
            urlencoding::encode(franchise)
        );
        let response: InstallmentsResponse =
            self.send(self.bearer(Method::GET, &path, token)).await?;
        Ok(response.game_installments)
    }
}

#[async_trait]
impl SessionBackend for TrackerClient {
    async fn issue_credential(&self, email: &str) -> Result<LoginResponse, ClientError> {
        self.login(email).await
    }

    async fn register_guest(&self, email: &str) -> Result<(), ClientError> {
        self.add_user(email).await.map(|_| ())
    }
}
