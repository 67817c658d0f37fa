// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local mirror of the remote activity collection.
//!
//! The store is the only writer of the mirror. It:
//! - replaces the mirror wholesale on every snapshot (`refresh`)
//! - applies optimistic changes and later commits or rolls them back
//! - refreshes on push notifications and, optionally, on a poll timer
//!
//! Overlapping refreshes are not sequenced: whichever snapshot lands last
//! wins. A snapshot that lands while a mutation is in flight may briefly hide
//! the optimistic change until that mutation commits or rolls back.

use crate::error::{AppError, Result};
use crate::models::{Activity, AnnotatedActivity, NewActivity, RawActivity, ViewConfig};
use crate::services::due;
use crate::services::pipeline;
use crate::services::remote::{Addressing, RemoteService};
use crate::services::resolver::{EntityResolver, Resolution};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;

/// Event type the remote emits when its collection changes.
pub const COLLECTION_CHANGED: &str = "activity_manager_updated";

/// Buffered push events per subscriber before older ones are dropped.
const PUSH_CHANNEL_CAPACITY: usize = 16;

// ─── Mutations ───────────────────────────────────────────────────────────────

/// A user change to the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a provisional record (id assigned locally until confirmed)
    Add {
        record: Activity,
        request: NewActivity,
    },
    Complete { id: String, at: DateTime<Utc> },
    Remove { id: String },
    AddName { id: String, name: String },
    RemoveName { id: String, index: usize },
}

impl Mutation {
    /// Id of the record this mutation touches in the mirror.
    pub fn activity_id(&self) -> &str {
        match self {
            Mutation::Add { record, .. } => &record.id,
            Mutation::Complete { id, .. }
            | Mutation::Remove { id }
            | Mutation::AddName { id, .. }
            | Mutation::RemoveName { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Add { .. } => "add",
            Mutation::Complete { .. } => "complete",
            Mutation::Remove { .. } => "remove",
            Mutation::AddName { .. } => "add_name",
            Mutation::RemoveName { .. } => "remove_name",
        }
    }
}

/// How to put the mirror back if the remote rejects the change.
#[derive(Debug, Clone)]
enum Undo {
    /// Drop the provisional record
    Discard,
    /// Put back the record as it was, at its old position if it vanished
    Restore { position: usize, record: Activity },
}

/// An optimistic change awaiting `commit` or `rollback`.
#[derive(Debug)]
#[must_use = "a pending mutation must be committed or rolled back"]
pub struct PendingMutation {
    mutation: Mutation,
    undo: Undo,
}

impl PendingMutation {
    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }
}

/// Authoritative information returned by the remote on success.
#[derive(Debug, Clone)]
pub enum Confirmation {
    Ack,
    /// The remote assigned this id to a newly added record
    Created { id: String },
    /// The remote's copy of the record after the change
    Record(Activity),
}

// ─── Push channel & subscriptions ────────────────────────────────────────────

/// A "collection changed" signal from the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub event_type: String,
}

impl PushEvent {
    pub fn collection_changed() -> Self {
        Self {
            event_type: COLLECTION_CHANGED.to_string(),
        }
    }
}

/// Fan-out point for push notifications.
#[derive(Clone)]
pub struct PushChannel {
    tx: broadcast::Sender<PushEvent>,
}

impl Default for PushChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PushChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Deliver `event` to every listener. Other event types are ignored.
    ///
    /// Returns whether the event was accepted.
    pub fn publish(&self, event: PushEvent) -> bool {
        if event.event_type != COLLECTION_CHANGED {
            tracing::debug!(event_type = %event.event_type, "Ignoring unrelated push event");
            return false;
        }
        // No receivers is fine: nobody is watching yet.
        let listeners = self.tx.send(event).unwrap_or(0);
        tracing::debug!(listeners, "Push event published");
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.tx.subscribe()
    }
}

/// Handle for a background refresh trigger. Dropping it stops the trigger.
pub struct Subscription {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self {
            name,
            handle: Some(handle),
        }
    }

    /// Stop listening now.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!(trigger = self.name, "Refresh trigger stopped");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Owner of the mirrored activity collection.
pub struct ActivityStore {
    remote: Arc<dyn RemoteService>,
    mirror: RwLock<Vec<Activity>>,
    resolver: EntityResolver,
    /// Activity id → number of mutations in flight for it.
    in_flight: DashMap<String, usize>,
    /// Bumped on every change to the mirror.
    generation: watch::Sender<u64>,
}

impl ActivityStore {
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            remote,
            mirror: RwLock::new(Vec::new()),
            resolver: EntityResolver::new(),
            in_flight: DashMap::new(),
            generation,
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteService> {
        &self.remote
    }

    /// Receiver that changes whenever the view may have changed.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    // ─── Reads ───────────────────────────────────────────────────────────

    /// Filtered, sorted and annotated view as of now.
    pub async fn view(&self, config: &ViewConfig) -> Vec<AnnotatedActivity> {
        self.view_at(config, Utc::now()).await
    }

    /// Filtered, sorted and annotated view as of `now`.
    pub async fn view_at(&self, config: &ViewConfig, now: DateTime<Utc>) -> Vec<AnnotatedActivity> {
        let mirror = self.mirror.read().await;
        pipeline::run(&mirror, config, now, |id| self.in_flight.contains_key(id))
    }

    /// Copy of every mirrored record, in snapshot order.
    pub async fn snapshot(&self) -> Vec<Activity> {
        self.mirror.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Activity> {
        self.mirror.read().await.iter().find(|a| a.id == id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.mirror.read().await.iter().any(|a| a.id == id)
    }

    /// Sorted distinct categories present in the mirror.
    pub async fn categories(&self) -> Vec<String> {
        self.mirror
            .read()
            .await
            .iter()
            .map(|a| a.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // ─── Snapshot ────────────────────────────────────────────────────────

    /// Fetch a full snapshot and replace the mirror with it.
    ///
    /// On any error the mirror is left untouched. Returns the record count.
    pub async fn refresh(&self) -> Result<usize> {
        let items = self.remote.list_items().await?;
        let activities = items
            .into_iter()
            .map(RawActivity::normalize)
            .collect::<Result<Vec<_>>>()?;

        let now = Utc::now();
        let overdue = activities
            .iter()
            .filter(|a| due::compute(a.last_completed, a.frequency, now).is_overdue())
            .count();
        let count = activities.len();

        *self.mirror.write().await = activities;
        self.resolver.invalidate();
        self.bump();

        tracing::debug!(count, overdue, "Activity snapshot refreshed");
        Ok(count)
    }

    /// `refresh` for background triggers: failures are logged, not returned.
    pub async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Refresh failed, keeping previous view");
        }
    }

    /// Refresh on every push event until the channel closes or the handle drops.
    pub fn subscribe(self: &Arc<Self>, mut events: broadcast::Receiver<PushEvent>) -> Subscription {
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!(
                            event_type = %event.event_type,
                            "Push notification received"
                        );
                        store.refresh_quietly().await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // One refresh covers every missed event.
                        tracing::debug!(skipped, "Push listener lagged");
                        store.refresh_quietly().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription::new("push", handle)
    }

    /// Refresh every `every` until the handle drops.
    pub fn poll(self: &Arc<Self>, every: Duration) -> Subscription {
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut ticker = tokio::time::interval_at(start, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                store.refresh_quietly().await;
            }
        });
        tracing::info!(interval_secs = every.as_secs(), "Polling refresh enabled");
        Subscription::new("poll", handle)
    }

    // ─── Resolution ──────────────────────────────────────────────────────

    /// Resolve the remote key for a mirrored activity.
    ///
    /// Activities missing from the mirror are `NotFound` without asking the
    /// remote.
    pub async fn resolve(&self, id: &str, addressing: Addressing) -> Result<Resolution> {
        if !self.contains(id).await {
            return Ok(Resolution::NotFound);
        }
        self.resolver
            .resolve(self.remote.as_ref(), id, addressing)
            .await
    }

    // ─── Optimistic changes ──────────────────────────────────────────────

    /// Apply `mutation` to the mirror before the remote confirms it.
    ///
    /// Fails without touching the mirror if the target record is gone or the
    /// change violates a local invariant.
    pub async fn apply_optimistic(&self, mutation: Mutation) -> Result<PendingMutation> {
        let undo = {
            let mut mirror = self.mirror.write().await;

            match &mutation {
                Mutation::Add { record, .. } => {
                    mirror.push(record.clone());
                    Undo::Discard
                }
                Mutation::Complete { id, at } => {
                    let position = locate(&mirror[..], id)?;
                    let record = mirror[position].clone();
                    mirror[position].complete_at(*at);
                    Undo::Restore { position, record }
                }
                Mutation::Remove { id } => {
                    let position = locate(&mirror[..], id)?;
                    let record = mirror.remove(position);
                    Undo::Restore { position, record }
                }
                Mutation::AddName { id, name } => {
                    let position = locate(&mirror[..], id)?;
                    let record = mirror[position].clone();
                    mirror[position].names.add_name(name.clone());
                    Undo::Restore { position, record }
                }
                Mutation::RemoveName { id, index } => {
                    let position = locate(&mirror[..], id)?;
                    let record = mirror[position].clone();
                    mirror[position].names.remove_name(*index)?;
                    Undo::Restore { position, record }
                }
            }
        };

        *self
            .in_flight
            .entry(mutation.activity_id().to_string())
            .or_insert(0) += 1;
        self.bump();

        tracing::info!(
            activity_id = %mutation.activity_id(),
            kind = mutation.kind(),
            "Optimistic change applied"
        );
        Ok(PendingMutation { mutation, undo })
    }

    /// Keep an optimistic change, folding in what the remote returned.
    pub async fn commit(&self, pending: PendingMutation, confirmation: Confirmation) {
        let id = pending.mutation.activity_id().to_string();
        {
            let mut mirror = self.mirror.write().await;
            match confirmation {
                Confirmation::Ack => {}
                Confirmation::Created { id: assigned } => {
                    if let Some(record) = mirror.iter_mut().find(|a| a.id == id) {
                        record.id = assigned;
                    }
                }
                Confirmation::Record(authoritative) => {
                    if let Some(record) = mirror.iter_mut().find(|a| a.id == authoritative.id) {
                        *record = authoritative;
                    }
                }
            }
        }
        self.release(&id);
        self.bump();

        tracing::info!(
            activity_id = %id,
            kind = pending.mutation.kind(),
            "Change committed"
        );
    }

    /// Undo an optimistic change, restoring the record exactly as it was.
    pub async fn rollback(&self, pending: PendingMutation) {
        let id = pending.mutation.activity_id().to_string();
        {
            let mut mirror = self.mirror.write().await;
            match pending.undo {
                Undo::Discard => mirror.retain(|a| a.id != id),
                Undo::Restore { position, record } => {
                    match mirror.iter_mut().find(|a| a.id == record.id) {
                        Some(slot) => *slot = record,
                        None => {
                            let at = position.min(mirror.len());
                            mirror.insert(at, record);
                        }
                    }
                }
            }
        }
        self.release(&id);
        self.bump();

        tracing::warn!(
            activity_id = %id,
            kind = pending.mutation.kind(),
            "Change rolled back"
        );
    }

    fn release(&self, id: &str) {
        let drained = match self.in_flight.get_mut(id) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if drained {
            self.in_flight.remove_if(id, |_, count| *count == 0);
        }
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g += 1);
    }
}

fn locate(mirror: &[Activity], id: &str) -> Result<usize> {
    mirror
        .iter()
        .position(|a| a.id == id)
        .ok_or_else(|| AppError::EntityNotFound(id.to_string()))
}
