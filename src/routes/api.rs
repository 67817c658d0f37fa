// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes: the activity view and the mutation entry points.

use crate::error::{AppError, Result};
use crate::models::{AnnotatedActivity, Frequency, NewActivity, ViewConfig};
use crate::services::{MutationOutcome, MutationState};
use crate::time_utils::parse_utc_rfc3339;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require the API token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", get(list_activities).post(add_activity))
        .route("/api/activities/{id}", delete(remove_activity))
        .route("/api/activities/{id}/complete", post(complete_activity))
        .route("/api/activities/{id}/names", post(add_name))
        .route("/api/activities/{id}/names/{index}", delete(remove_name))
        .route("/api/categories", get(list_categories))
        .route("/api/refresh", post(refresh))
}

// ─── View ────────────────────────────────────────────────────

/// Query overrides for the configured view.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ViewQuery {
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub due_only: Option<bool>,
    #[validate(range(min = 0, max = 8760))]
    pub soon_hours: Option<i64>,
}

impl ViewQuery {
    /// Layer these overrides on top of `base`.
    pub fn apply(&self, base: ViewConfig) -> ViewConfig {
        let mut config = base;
        if let Some(category) = &self.category {
            config = config.with_category(category.clone());
        }
        if let Some(due_only) = self.due_only {
            config = config.with_due_only(due_only);
        }
        if let Some(hours) = self.soon_hours {
            config = config.with_soon_hours(hours);
        }
        config
    }
}

/// Filtered and sorted activity list.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ViewResponse {
    pub header: String,
    pub icon: String,
    pub activities: Vec<AnnotatedActivity>,
}

/// Get the activity view.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ViewResponse>> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let config = query.apply(state.config.view_config());
    let activities = state.store.view(&config).await;

    Ok(Json(ViewResponse {
        header: config.header,
        icon: config.icon,
        activities,
    }))
}

/// Get the distinct categories, sorted.
async fn list_categories(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.store.categories().await)
}

/// Manual refresh result.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RefreshResponse {
    /// False when the snapshot could not be fetched and the old view stays
    pub refreshed: bool,
    pub count: usize,
}

/// Fetch a fresh snapshot now.
async fn refresh(State(state): State<Arc<AppState>>) -> Json<RefreshResponse> {
    match state.store.refresh().await {
        Ok(count) => Json(RefreshResponse {
            refreshed: true,
            count,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Manual refresh failed, keeping previous view");
            Json(RefreshResponse {
                refreshed: false,
                count: state.store.snapshot().await.len(),
            })
        }
    }
}

// ─── Mutations ───────────────────────────────────────────────

/// Body of a mutation that did not commit. `details` is the text the user
/// should see.
#[derive(Serialize)]
struct MutationErrorResponse<'a> {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    state: MutationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    activity_id: Option<&'a str>,
}

impl IntoResponse for MutationOutcome {
    fn into_response(self) -> Response {
        match self.error().map(|e| (e.status(), e.code())) {
            None => Json(self).into_response(),
            Some((status, code)) => {
                let body = MutationErrorResponse {
                    error: code,
                    details: self.notification.as_ref().map(|n| n.message.as_str()),
                    state: self.state,
                    activity_id: self.activity_id.as_deref(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

/// New activity request.
#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AddActivityRequest {
    /// One name, or several separated by commas
    #[validate(length(min = 1, max = 500))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub frequency: Frequency,
    #[validate(length(max = 100))]
    pub icon: Option<String>,
    /// RFC3339 timestamp; defaults to now
    pub last_completed: Option<String>,
}

impl AddActivityRequest {
    pub fn into_new_activity(self) -> Result<NewActivity> {
        self.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let mut new = NewActivity::from_name_input(&self.name, self.category, self.frequency);
        if let Some(icon) = self.icon.filter(|i| !i.trim().is_empty()) {
            new = new.with_icon(icon);
        }
        if let Some(raw) = self.last_completed {
            let at = parse_utc_rfc3339(&raw)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid timestamp: {}", raw)))?;
            new = new.with_last_completed(at);
        }
        Ok(new)
    }
}

/// Create an activity.
async fn add_activity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddActivityRequest>,
) -> Result<MutationOutcome> {
    let new = request.into_new_activity()?;
    Ok(state.coordinator.add(new).await)
}

#[derive(Debug, Default, Deserialize)]
struct CompleteRequest {
    at: Option<String>,
}

/// Mark an activity done, now or at `{ "at": RFC3339 }`.
async fn complete_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<MutationOutcome> {
    let request: CompleteRequest = if body.is_empty() {
        CompleteRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid body: {}", e)))?
    };
    let at = match request.at {
        Some(raw) => Some(
            parse_utc_rfc3339(&raw)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid timestamp: {}", raw)))?,
        ),
        None => None,
    };

    Ok(state.coordinator.complete(&id, at).await)
}

/// Delete an activity.
async fn remove_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> MutationOutcome {
    state.coordinator.remove(&id).await
}

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AddNameRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Add a display name to the rotation.
async fn add_name(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<AddNameRequest>,
) -> Result<MutationOutcome> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(state.coordinator.add_name(&id, &request.name).await)
}

/// Remove the display name at `index`.
async fn remove_name(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, usize)>,
) -> MutationOutcome {
    state.coordinator.remove_name(&id, index).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_overrides_config() {
        let base = ViewConfig::default().with_category("Chores");
        let query = ViewQuery {
            category: Some("Garden".to_string()),
            due_only: Some(true),
            soon_hours: Some(2),
        };
        let config = query.apply(base);
        assert_eq!(config.category.as_deref(), Some("Garden"));
        assert_eq!(config.header, "Garden");
        assert!(config.due_only);
        assert_eq!(config.soon_threshold, chrono::Duration::hours(2));
    }

    #[test]
    fn test_empty_query_keeps_config() {
        let base = ViewConfig::default().with_due_only(true);
        assert_eq!(ViewQuery::default().apply(base.clone()), base);
    }

    #[test]
    fn test_add_request_splits_names() {
        let request = AddActivityRequest {
            name: "Alice, Bob".to_string(),
            category: "Chores".to_string(),
            frequency: Frequency::days(3),
            icon: Some("mdi:broom".to_string()),
            last_completed: Some("2026-01-02T03:04:05Z".to_string()),
        };
        let new = request.into_new_activity().unwrap();
        assert_eq!(new.names, vec!["Alice", "Bob"]);
        assert_eq!(new.icon.as_deref(), Some("mdi:broom"));
        assert!(new.last_completed.is_some());
    }

    #[test]
    fn test_add_request_rejects_bad_timestamp() {
        let request = AddActivityRequest {
            name: "Alice".to_string(),
            category: "Chores".to_string(),
            frequency: Frequency::days(1),
            icon: None,
            last_completed: Some("yesterday".to_string()),
        };
        assert!(matches!(
            request.into_new_activity(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_add_request_requires_category() {
        let request = AddActivityRequest {
            name: "Alice".to_string(),
            category: String::new(),
            frequency: Frequency::days(1),
            icon: None,
            last_completed: None,
        };
        assert!(matches!(
            request.into_new_activity(),
            Err(AppError::BadRequest(_))
        ));
    }
}
