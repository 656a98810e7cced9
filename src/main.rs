// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Game Stats Tracker API Server
//!
//! Records per-user match statistics in PostgreSQL and issues short-lived
//! credentials to allow-listed users.

use game_stats_tracker::{config::Config, db::PgStore, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "game_stats_tracker=debug,info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        trusted_emails = config.trusted_emails.len(),
        "Starting Game Stats Tracker API"
    );

    // Connect and migrate
    let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
    store.migrate().await?;

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), Arc::new(store)));

    // Build router
    let app = game_stats_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(format)
        .init();
}
