// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The remote activity service, as seen by the store and coordinator.
//!
//! The remote owns the durable copy of every activity. This trait covers the
//! calls the engine makes; push notifications arrive separately through
//! [`crate::services::store::PushChannel`].

use crate::error::Result;
use crate::models::{NewActivity, RawActivity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Operations that target an existing activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Complete,
    Remove,
    AddName,
    RemoveName,
}

/// How the remote expects an existing activity to be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// The activity's own id
    ById,
    /// A derived key found by searching the remote's entity listing
    EntityLookup,
}

impl FromStr for Addressing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Addressing::ById),
            "entity" => Ok(Addressing::EntityLookup),
            other => Err(format!("unknown addressing mode {:?}", other)),
        }
    }
}

/// Identifier in whatever form the remote wants for a given call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteKey(pub String);

impl RemoteKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the remote's entity listing, used for key lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl EntityState {
    /// Integration tag that marks entities backed by an activity.
    pub const INTEGRATION: &'static str = "activity_manager";

    /// True when this entity represents the activity with `activity_id`.
    pub fn represents(&self, activity_id: &str) -> bool {
        let integration = self
            .attributes
            .get("integration")
            .and_then(|v| v.as_str());
        let id_matches = match self.attributes.get("id") {
            Some(serde_json::Value::String(s)) => s == activity_id,
            Some(serde_json::Value::Number(n)) => n.to_string() == activity_id,
            _ => false,
        };
        integration == Some(Self::INTEGRATION) && id_matches
    }
}

/// What the remote said when it accepted a completion.
#[derive(Debug, Clone)]
pub enum CompleteAck {
    /// Plain acknowledgement
    Ack,
    /// The authoritative record after the change
    Record(RawActivity),
}

/// Remote collaborator surface.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Addressing the remote expects for `op`.
    fn addressing(&self, op: RemoteOp) -> Addressing;

    /// Full snapshot of every activity.
    async fn list_items(&self) -> Result<Vec<RawActivity>>;

    /// Entity listing used to derive addressing keys.
    async fn list_entities(&self) -> Result<Vec<EntityState>>;

    /// Create an activity; returns its new id.
    async fn add_activity(&self, activity: &NewActivity) -> Result<String>;

    async fn complete_activity(&self, key: &RemoteKey, at: DateTime<Utc>) -> Result<CompleteAck>;

    async fn remove_activity(&self, key: &RemoteKey) -> Result<()>;

    async fn add_name(&self, key: &RemoteKey, name: &str) -> Result<()>;

    async fn remove_name(&self, key: &RemoteKey, index: usize) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(attrs: serde_json::Value) -> EntityState {
        serde_json::from_value(json!({ "entity_id": "sensor.x", "attributes": attrs })).unwrap()
    }

    #[test]
    fn test_addressing_from_str() {
        assert_eq!("id".parse::<Addressing>().unwrap(), Addressing::ById);
        assert_eq!(" Entity ".parse::<Addressing>().unwrap(), Addressing::EntityLookup);
        assert!("name".parse::<Addressing>().is_err());
    }

    #[test]
    fn test_entity_represents_matching_activity() {
        let e = entity(json!({ "integration": "activity_manager", "id": "abc" }));
        assert!(e.represents("abc"));
        assert!(!e.represents("abd"));
    }

    #[test]
    fn test_entity_numeric_id() {
        let e = entity(json!({ "integration": "activity_manager", "id": 42 }));
        assert!(e.represents("42"));
    }

    #[test]
    fn test_entity_from_other_integration_is_ignored() {
        let e = entity(json!({ "integration": "todo", "id": "abc" }));
        assert!(!e.represents("abc"));

        let bare: EntityState =
            serde_json::from_value(json!({ "entity_id": "light.kitchen" })).unwrap();
        assert!(!bare.represents("abc"));
    }
}
