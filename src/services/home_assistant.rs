// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Home Assistant client for the activity_manager integration.
//!
//! Handles:
//! - Item snapshots (`/api/activity_manager/items`)
//! - Entity listing for key lookup (`/api/states`)
//! - Service calls for add, complete, add name and remove name
//! - Removal by item id (`/api/activity_manager/remove`)

use crate::error::{AppError, Result};
use crate::models::{NewActivity, RawActivity};
use crate::services::remote::{
    Addressing, CompleteAck, EntityState, RemoteKey, RemoteOp, RemoteService,
};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

/// Service domain registered by the integration.
const DOMAIN: &str = "activity_manager";

/// HTTP client for a Home Assistant instance.
#[derive(Clone)]
pub struct HomeAssistantClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    addressing: Addressing,
}

/// Reply to a service call made with `?return_response`.
#[derive(Debug, Deserialize)]
struct ServiceReply {
    #[serde(default)]
    service_response: Option<Value>,
}

impl HomeAssistantClient {
    /// `addressing` applies to every call except remove, which always takes
    /// the item id.
    pub fn new(base_url: &str, token: &str, addressing: Addressing) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            addressing,
        }
    }

    /// Field name the integration expects for a key of `op`.
    fn key_field(&self, op: RemoteOp) -> &'static str {
        match self.addressing(op) {
            Addressing::ById => "item_id",
            Addressing::EntityLookup => "entity_id",
        }
    }

    /// Call `activity_manager.<service>` and ignore any response body.
    async fn call_service(&self, service: &str, body: Value) -> Result<()> {
        let url = format!("{}/api/services/{}/{}", self.base_url, DOMAIN, service);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        self.check_response(response).await
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::status_error(response).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("JSON parse error: {}", e)))
    }

    async fn status_error(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 401 {
            tracing::warn!("Home Assistant rejected the access token (401)");
        }

        AppError::RemoteUnavailable(format!("HTTP {}: {}", status, body))
    }
}

#[async_trait]
impl RemoteService for HomeAssistantClient {
    fn addressing(&self, op: RemoteOp) -> Addressing {
        match op {
            RemoteOp::Remove => Addressing::ById,
            _ => self.addressing,
        }
    }

    async fn list_items(&self) -> Result<Vec<RawActivity>> {
        let url = format!("{}/api/{}/items", self.base_url, DOMAIN);
        self.get_json(&url).await
    }

    async fn list_entities(&self) -> Result<Vec<EntityState>> {
        let url = format!("{}/api/states", self.base_url);
        self.get_json(&url).await
    }

    async fn add_activity(&self, activity: &NewActivity) -> Result<String> {
        let url = format!(
            "{}/api/services/{}/add_activity?return_response",
            self.base_url, DOMAIN
        );

        // A single name goes over as a plain string.
        let name = match activity.names.as_slice() {
            [single] => json!(single),
            many => json!(many),
        };
        let mut body = json!({
            "name": name,
            "category": activity.category,
            "frequency": activity.frequency,
        });
        if let Some(icon) = &activity.icon {
            body["icon"] = json!(icon);
        }
        if let Some(at) = activity.last_completed {
            body["last_completed"] = json!(format_utc_rfc3339(at));
        }

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        let reply: ServiceReply = self.check_response_json(response).await?;
        let id = reply
            .service_response
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                AppError::MalformedResponse("add_activity response has no id".to_string())
            })?;

        tracing::info!(activity_id = %id, "Activity created in Home Assistant");
        Ok(id)
    }

    async fn complete_activity(&self, key: &RemoteKey, at: DateTime<Utc>) -> Result<CompleteAck> {
        let mut body = json!({ "last_completed": format_utc_rfc3339(at) });
        body[self.key_field(RemoteOp::Complete)] = json!(key.as_str());
        self.call_service("update_activity", body).await?;
        Ok(CompleteAck::Ack)
    }

    async fn remove_activity(&self, key: &RemoteKey) -> Result<()> {
        let url = format!("{}/api/{}/remove", self.base_url, DOMAIN);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "item_id": key.as_str() }))
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        self.check_response(response).await
    }

    async fn add_name(&self, key: &RemoteKey, name: &str) -> Result<()> {
        let mut body = json!({ "name": name });
        body[self.key_field(RemoteOp::AddName)] = json!(key.as_str());
        self.call_service("add_name", body).await
    }

    async fn remove_name(&self, key: &RemoteKey, index: usize) -> Result<()> {
        let mut body = json!({ "index": index });
        body[self.key_field(RemoteOp::RemoveName)] = json!(key.as_str());
        self.call_service("remove_name", body).await
    }
}
