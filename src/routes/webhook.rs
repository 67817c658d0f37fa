// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for push notifications from Home Assistant.
//!
//! An automation on the Home Assistant side forwards every
//! `activity_manager_updated` event here; the store then refreshes.

use crate::middleware::auth::tokens_match;
use crate::services::PushEvent;
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/{token}", post(handle_event))
}

/// Push event payload.
#[derive(Deserialize, Debug)]
struct WebhookEvent {
    event_type: String,
}

/// Handle incoming push events (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(event): Json<WebhookEvent>,
) -> StatusCode {
    if !tokens_match(&token, &state.config.webhook_token) {
        tracing::warn!("Security Alert: Webhook path token mismatch");
        return StatusCode::NOT_FOUND;
    }

    let accepted = state.push.publish(PushEvent {
        event_type: event.event_type,
    });
    tracing::debug!(accepted, "Webhook event handled");

    // Unrelated events are acknowledged too, so the sender does not retry.
    StatusCode::OK
}
