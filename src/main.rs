// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity Manager API Server
//!
//! Mirrors the Home Assistant activity_manager integration and serves the
//! annotated activity view plus optimistic mutation endpoints.

use activity_manager::{config::Config, services::HomeAssistantClient, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Activity Manager API");

    let remote = Arc::new(HomeAssistantClient::new(
        &config.remote_url,
        &config.remote_token,
        config.addressing,
    ));
    tracing::info!(
        remote = %config.remote_url,
        addressing = ?config.addressing,
        "Home Assistant client initialized"
    );

    let state = Arc::new(AppState::new(config.clone(), remote));

    // A failed first snapshot is retried on the next push or poll.
    state.store.refresh_quietly().await;

    // Refresh triggers live as long as these handles
    let _push = state.store.subscribe(state.push.subscribe());
    let _poll = config.poll_interval.map(|every| state.store.poll(every));

    // Build router
    let app = activity_manager::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
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
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("activity_manager=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
