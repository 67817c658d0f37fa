// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory remote service (offline mode and tests).
//!
//! Behaves like the real integration: entity keys are derived from the
//! category and first name, completion advances the name rotation, and
//! individual operations can be made to fail on demand.

use crate::error::{AppError, Result};
use crate::models::{NewActivity, RawActivity};
use crate::services::remote::{
    Addressing, CompleteAck, EntityState, RemoteKey, RemoteOp, RemoteService,
};
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Remote calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListItems,
    ListEntities,
    Add,
    Complete,
    Remove,
    AddName,
    RemoveName,
}

/// How an injected failure presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    Malformed,
}

#[derive(Default)]
struct State {
    items: Vec<RawActivity>,
    failures: HashMap<FailPoint, FailureKind>,
    calls: Vec<String>,
}

/// Remote service backed by a vector of records.
pub struct InMemoryRemote {
    state: Mutex<State>,
    entity_addressing: Addressing,
    latency: Mutex<Option<Duration>>,
    next_id: AtomicU64,
}

impl InMemoryRemote {
    /// Empty remote; `entity_addressing` applies to every op except remove,
    /// which always uses the activity id.
    pub fn new(entity_addressing: Addressing) -> Self {
        Self {
            state: Mutex::new(State::default()),
            entity_addressing,
            latency: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_items(self, items: Vec<RawActivity>) -> Self {
        self.lock().items = items;
        self
    }

    /// Make `point` fail until [`InMemoryRemote::recover`] is called.
    pub fn fail(&self, point: FailPoint, kind: FailureKind) {
        self.lock().failures.insert(point, kind);
    }

    pub fn recover(&self, point: FailPoint) {
        self.lock().failures.remove(&point);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Names of the calls received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Current remote-side records.
    pub fn items(&self) -> Vec<RawActivity> {
        self.lock().items.clone()
    }

    /// Replace a record directly, as another client would.
    pub fn upsert(&self, item: RawActivity) {
        let mut state = self.lock();
        match state.items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => *slot = item,
            None => state.items.push(item),
        }
    }

    /// Entity key derived from category and first name, e.g. `sensor.chores_vacuum`.
    pub fn entity_key(item: &RawActivity) -> String {
        let first = item
            .names
            .as_ref()
            .and_then(|n| n.first())
            .or(item.name.as_ref())
            .map(String::as_str)
            .unwrap_or("unnamed");
        let raw = format!("{}_{}", item.category.as_deref().unwrap_or(""), first);
        let slug: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("sensor.{}", slug)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, wait out the latency, then apply any injected failure.
    async fn enter(&self, call: String, point: FailPoint) -> Result<()> {
        let latency = *self
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.calls.push(call);
        match state.failures.get(&point) {
            Some(FailureKind::Unavailable) => Err(AppError::RemoteUnavailable(format!(
                "injected failure at {:?}",
                point
            ))),
            Some(FailureKind::Malformed) => Err(AppError::MalformedResponse(format!(
                "injected malformed payload at {:?}",
                point
            ))),
            None => Ok(()),
        }
    }

    fn position(&self, state: &State, key: &RemoteKey, op: RemoteOp) -> Result<usize> {
        let by_entity = self.addressing(op) == Addressing::EntityLookup;
        state
            .items
            .iter()
            .position(|item| {
                if by_entity {
                    Self::entity_key(item) == key.as_str()
                } else {
                    item.id.as_deref() == Some(key.as_str())
                }
            })
            .ok_or_else(|| AppError::RemoteUnavailable(format!("HTTP 404: no activity {}", key)))
    }
}

#[async_trait]
impl RemoteService for InMemoryRemote {
    fn addressing(&self, op: RemoteOp) -> Addressing {
        match op {
            RemoteOp::Remove => Addressing::ById,
            _ => self.entity_addressing,
        }
    }

    async fn list_items(&self) -> Result<Vec<RawActivity>> {
        self.enter("list_items".to_string(), FailPoint::ListItems)
            .await?;
        Ok(self.items())
    }

    async fn list_entities(&self) -> Result<Vec<EntityState>> {
        self.enter("list_entities".to_string(), FailPoint::ListEntities)
            .await?;
        let entities = self
            .lock()
            .items
            .iter()
            .map(|item| {
                let mut attributes = serde_json::Map::new();
                attributes.insert(
                    "integration".to_string(),
                    EntityState::INTEGRATION.into(),
                );
                attributes.insert(
                    "id".to_string(),
                    item.id.clone().unwrap_or_default().into(),
                );
                EntityState {
                    entity_id: Self::entity_key(item),
                    attributes,
                }
            })
            .collect();
        Ok(entities)
    }

    async fn add_activity(&self, activity: &NewActivity) -> Result<String> {
        self.enter("add_activity".to_string(), FailPoint::Add)
            .await?;
        let frequency = activity.validate()?;
        let id = format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let item = RawActivity {
            id: Some(id.clone()),
            name: None,
            names: Some(activity.names.clone()),
            current_name_index: Some(0),
            category: Some(activity.category.clone()),
            last_completed: Some(format_utc_rfc3339(
                activity.last_completed.unwrap_or_else(Utc::now),
            )),
            frequency_ms: Some(frequency.num_milliseconds()),
            icon: activity.icon.clone(),
        };
        self.lock().items.push(item);
        Ok(id)
    }

    async fn complete_activity(&self, key: &RemoteKey, at: DateTime<Utc>) -> Result<CompleteAck> {
        self.enter(format!("complete_activity:{}", key), FailPoint::Complete)
            .await?;
        let mut state = self.lock();
        let pos = self.position(&state, key, RemoteOp::Complete)?;
        let item = &mut state.items[pos];
        item.last_completed = Some(format_utc_rfc3339(at));
        let count = item.names.as_ref().map(Vec::len).unwrap_or(1) as i64;
        if count > 1 {
            item.current_name_index = Some((item.current_name_index.unwrap_or(0) + 1) % count);
        }
        Ok(CompleteAck::Record(item.clone()))
    }

    async fn remove_activity(&self, key: &RemoteKey) -> Result<()> {
        self.enter(format!("remove_activity:{}", key), FailPoint::Remove)
            .await?;
        let mut state = self.lock();
        let pos = self.position(&state, key, RemoteOp::Remove)?;
        state.items.remove(pos);
        Ok(())
    }

    async fn add_name(&self, key: &RemoteKey, name: &str) -> Result<()> {
        self.enter(format!("add_name:{}", key), FailPoint::AddName)
            .await?;
        let mut state = self.lock();
        let pos = self.position(&state, key, RemoteOp::AddName)?;
        let item = &mut state.items[pos];
        let legacy = item.name.clone();
        item.names
            .get_or_insert_with(|| legacy.into_iter().collect())
            .push(name.to_string());
        Ok(())
    }

    async fn remove_name(&self, key: &RemoteKey, index: usize) -> Result<()> {
        self.enter(format!("remove_name:{}", key), FailPoint::RemoveName)
            .await?;
        let mut state = self.lock();
        let pos = self.position(&state, key, RemoteOp::RemoveName)?;
        let item = &mut state.items[pos];
        let names = item.names.get_or_insert_with(Vec::new);
        if names.len() <= 1 || index >= names.len() {
            return Err(AppError::RemoteUnavailable(
                "HTTP 400: cannot remove name".to_string(),
            ));
        }
        names.remove(index);
        let len = names.len() as i64;
        let current = item.current_name_index.unwrap_or(0);
        let idx = index as i64;
        if idx < current {
            item.current_name_index = Some(current - 1);
        } else if idx == current && current == len {
            item.current_name_index = Some(len - 1);
        }
        Ok(())
    }
}
