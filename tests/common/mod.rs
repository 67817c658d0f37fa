// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use activity_manager::config::Config;
use activity_manager::models::RawActivity;
use activity_manager::routes::create_router;
use activity_manager::services::{Addressing, InMemoryRemote};
use activity_manager::AppState;
use axum::body::Body;
use axum::http::{header, Request};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Raw record as the remote would send it, due `remaining` from now.
#[allow(dead_code)]
pub fn raw_activity(id: &str, names: &[&str], category: &str, remaining: Duration) -> RawActivity {
    let frequency = Duration::days(7);
    let last_completed: DateTime<Utc> = Utc::now() - frequency + remaining;
    RawActivity {
        id: Some(id.to_string()),
        names: Some(names.iter().map(|n| n.to_string()).collect()),
        current_name_index: Some(0),
        category: Some(category.to_string()),
        last_completed: Some(last_completed.to_rfc3339()),
        frequency_ms: Some(frequency.num_milliseconds()),
        ..RawActivity::default()
    }
}

/// A small household: one overdue, one due soon, one upcoming, one shared.
#[allow(dead_code)]
pub fn household() -> Vec<RawActivity> {
    vec![
        raw_activity("vacuum", &["Alice", "Bob"], "Chores", Duration::days(3)),
        raw_activity("dishes", &["Bob"], "Chores", Duration::hours(-5)),
        raw_activity("water", &["Cara"], "Garden", Duration::hours(2)),
        raw_activity("bins", &["Alice"], "Activities", Duration::days(1) + Duration::hours(1)),
    ]
}

/// In-memory remote preloaded with `items`.
#[allow(dead_code)]
pub fn test_remote(addressing: Addressing, items: Vec<RawActivity>) -> Arc<InMemoryRemote> {
    Arc::new(InMemoryRemote::new(addressing).with_items(items))
}

/// Create a test app backed by an in-memory remote, with the mirror loaded.
/// Returns the router, the shared state and the remote.
#[allow(dead_code)]
pub async fn create_test_app(
    items: Vec<RawActivity>,
) -> (axum::Router, Arc<AppState>, Arc<InMemoryRemote>) {
    let config = Config::test_default();
    let remote = test_remote(config.addressing, items);
    let state = Arc::new(AppState::new(config, remote.clone()));
    state
        .store
        .refresh()
        .await
        .expect("in-memory snapshot should load");

    (create_router(state.clone()), state, remote)
}

/// Request carrying the test API token.
#[allow(dead_code)]
pub fn authed(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let token = Config::test_default().api_token;
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
