// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Game Stats Tracker: per-user video game statistics behind a two-tier
//! trust model.
//!
//! This crate provides the backend API (credential issuing, ownership-scoped
//! data access over PostgreSQL) and a typed client with the session state
//! machine a UI drives.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Store;
use services::StatsGateway;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub gateway: StatsGateway,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        Self {
            config,
            gateway: StatsGateway::new(store.clone()),
            store,
        }
    }
}
