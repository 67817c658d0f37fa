// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mutation coordinator: optimistic apply, remote call, commit or rollback.
//!
//! Every user change runs the same sequence:
//! 1. Validate locally
//! 2. Resolve the remote key (aborts with `EntityNotFound` before any change)
//! 3. Apply the change to the mirror
//! 4. Call the remote
//! 5. Commit and refresh in the background, or roll back and notify
//!
//! Failed mutations are never retried here.

use crate::error::{AppError, Notification, Result};
use crate::models::{Activity, NewActivity};
use crate::services::remote::{CompleteAck, RemoteKey, RemoteOp};
use crate::services::resolver::Resolution;
use crate::services::store::{ActivityStore, Confirmation, Mutation, PendingMutation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How long a removed activity may linger before a refresh is forced.
pub const REMOVE_FALLBACK_DELAY: Duration = Duration::from_millis(500);

const NOTIFICATION_CAPACITY: usize = 32;

/// Where a mutation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    Idle,
    Validating,
    OptimisticallyApplied,
    Committed,
    RolledBack,
    /// Stopped before anything was applied (validation or resolution failed)
    Rejected,
}

impl MutationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MutationState::Committed | MutationState::RolledBack | MutationState::Rejected
        )
    }
}

/// Result of one user mutation, as reported back to the caller.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MutationOutcome {
    pub state: MutationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(skip)]
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    error: Option<AppError>,
}

impl MutationOutcome {
    pub fn is_committed(&self) -> bool {
        self.state == MutationState::Committed
    }

    /// The error that stopped the mutation, if it did not commit.
    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }
}

/// Tracks one mutation through its states.
struct Attempt {
    kind: &'static str,
    activity_id: Option<String>,
    state: MutationState,
}

impl Attempt {
    fn start(kind: &'static str, activity_id: Option<String>) -> Self {
        Self {
            kind,
            activity_id,
            state: MutationState::Idle,
        }
    }

    fn enter(&mut self, next: MutationState) {
        tracing::trace!(
            kind = self.kind,
            activity_id = ?self.activity_id,
            from = ?self.state,
            to = ?next,
            "Mutation state change"
        );
        self.state = next;
    }

    fn committed(mut self, activity_id: String) -> MutationOutcome {
        self.enter(MutationState::Committed);
        let notification = match self.kind {
            "add_name" => Some(Notification::info("Name added successfully!")),
            "remove_name" => Some(Notification::info("Name removed!")),
            _ => None,
        };
        MutationOutcome {
            state: self.state,
            activity_id: Some(activity_id),
            notification,
            error: None,
        }
    }

    fn failed(mut self, next: MutationState, error: AppError) -> MutationOutcome {
        self.enter(next);
        tracing::warn!(
            kind = self.kind,
            activity_id = ?self.activity_id,
            state = ?self.state,
            error = %error,
            "Mutation failed"
        );
        let notification = match (next, rollback_message(self.kind)) {
            (MutationState::RolledBack, Some(message)) => Notification::error(message),
            _ => Notification::from(&error),
        };
        MutationOutcome {
            state: self.state,
            activity_id: self.activity_id,
            notification: Some(notification),
            error: Some(error),
        }
    }
}

/// What the user is told when the remote refused a change.
fn rollback_message(kind: &str) -> Option<&'static str> {
    match kind {
        "add" => Some("Error adding activity. Please try again."),
        "complete" => Some("Error updating activity. Please try again."),
        "remove" => Some("Error removing activity. Please try again."),
        "add_name" => Some("Error adding name. Please try again."),
        "remove_name" => Some("Error removing name. Please try again."),
        _ => None,
    }
}

/// Runs user mutations against the store and the remote.
pub struct MutationCoordinator {
    store: Arc<ActivityStore>,
    notifications: broadcast::Sender<Notification>,
    provisional_seq: AtomicU64,
}

impl MutationCoordinator {
    pub fn new(store: Arc<ActivityStore>) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            store,
            notifications,
            provisional_seq: AtomicU64::new(1),
        }
    }

    pub fn store(&self) -> &Arc<ActivityStore> {
        &self.store
    }

    /// User-visible notifications for failed mutations and name edits.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    // ─── Entry points ────────────────────────────────────────────────────

    /// Create an activity. A provisional record is shown until the remote
    /// assigns the real id.
    pub async fn add(&self, new: NewActivity) -> MutationOutcome {
        let mut attempt = Attempt::start("add", None);
        attempt.enter(MutationState::Validating);

        let provisional_id = format!(
            "pending-{}",
            self.provisional_seq.fetch_add(1, Ordering::Relaxed)
        );
        let record = match new.provisional(provisional_id.clone(), Utc::now()) {
            Ok(record) => record,
            Err(e) => return self.reject(attempt, e),
        };
        attempt.activity_id = Some(provisional_id);

        let mutation = Mutation::Add {
            record,
            request: new,
        };
        let pending = match self.store.apply_optimistic(mutation).await {
            Ok(pending) => pending,
            Err(e) => return self.reject(attempt, e),
        };
        attempt.enter(MutationState::OptimisticallyApplied);

        self.finish(attempt, pending, None).await
    }

    /// Mark an activity done at `at` (now when `None`).
    pub async fn complete(&self, id: &str, at: Option<DateTime<Utc>>) -> MutationOutcome {
        let mutation = Mutation::Complete {
            id: id.to_string(),
            at: at.unwrap_or_else(Utc::now),
        };
        self.run(mutation, RemoteOp::Complete, |_| Ok(())).await
    }

    /// Delete an activity. If a push does not remove it from the mirror
    /// shortly after, a refresh is forced.
    pub async fn remove(&self, id: &str) -> MutationOutcome {
        let mutation = Mutation::Remove { id: id.to_string() };
        let outcome = self.run(mutation, RemoteOp::Remove, |_| Ok(())).await;
        if outcome.is_committed() {
            self.refresh_if_lingering(id.to_string());
        }
        outcome
    }

    /// Append a display name to the rotation.
    pub async fn add_name(&self, id: &str, name: &str) -> MutationOutcome {
        let name = name.trim().to_string();
        let mutation = Mutation::AddName {
            id: id.to_string(),
            name: name.clone(),
        };
        self.run(mutation, RemoteOp::AddName, move |_| {
            if name.is_empty() {
                return Err(AppError::InvalidOperation("Name cannot be empty".to_string()));
            }
            Ok(())
        })
        .await
    }

    /// Remove the display name at `index`. The last name can never go.
    pub async fn remove_name(&self, id: &str, index: usize) -> MutationOutcome {
        let mutation = Mutation::RemoveName {
            id: id.to_string(),
            index,
        };
        self.run(mutation, RemoteOp::RemoveName, move |record| {
            record.names.check_removable(index)
        })
        .await
    }

    // ─── Sequence ────────────────────────────────────────────────────────

    /// Full sequence for a mutation of an existing activity.
    async fn run<V>(&self, mutation: Mutation, op: RemoteOp, validate: V) -> MutationOutcome
    where
        V: FnOnce(&Activity) -> Result<()>,
    {
        let id = mutation.activity_id().to_string();
        let mut attempt = Attempt::start(mutation.kind(), Some(id.clone()));
        attempt.enter(MutationState::Validating);

        let Some(record) = self.store.get(&id).await else {
            return self.reject(attempt, AppError::EntityNotFound(id));
        };
        if let Err(e) = validate(&record) {
            return self.reject(attempt, e);
        }

        let addressing = self.store.remote().addressing(op);
        let key = match self.store.resolve(&id, addressing).await {
            Ok(Resolution::Found(key)) => key,
            Ok(Resolution::NotFound) => {
                return self.reject(attempt, AppError::EntityNotFound(id));
            }
            Err(e) => return self.reject(attempt, e),
        };

        let pending = match self.store.apply_optimistic(mutation).await {
            Ok(pending) => pending,
            Err(e) => return self.reject(attempt, e),
        };
        attempt.enter(MutationState::OptimisticallyApplied);

        self.finish(attempt, pending, Some(key)).await
    }

    /// Call the remote for an applied change, then commit or roll back.
    async fn finish(
        &self,
        attempt: Attempt,
        pending: PendingMutation,
        key: Option<RemoteKey>,
    ) -> MutationOutcome {
        match self.send(key.as_ref(), pending.mutation()).await {
            Ok(confirmation) => {
                let id = match &confirmation {
                    Confirmation::Created { id } => id.clone(),
                    _ => pending.mutation().activity_id().to_string(),
                };
                self.store.commit(pending, confirmation).await;
                self.refresh_in_background();
                let outcome = attempt.committed(id);
                self.notify(&outcome);
                outcome
            }
            Err(e) => self.roll_back(attempt, pending, e).await,
        }
    }

    /// Issue the remote call for `mutation`. Only `Add` goes without a key.
    async fn send(
        &self,
        key: Option<&RemoteKey>,
        mutation: &Mutation,
    ) -> Result<Confirmation> {
        let remote = self.store.remote();
        match (mutation, key) {
            (Mutation::Add { request, .. }, _) => {
                let id = remote.add_activity(request).await?;
                Ok(Confirmation::Created { id })
            }
            (_, None) => Err(AppError::EntityNotFound(mutation.activity_id().to_string())),
            (Mutation::Complete { at, .. }, Some(key)) => {
                match remote.complete_activity(key, *at).await? {
                    CompleteAck::Ack => Ok(Confirmation::Ack),
                    CompleteAck::Record(raw) => Ok(Confirmation::Record(raw.normalize()?)),
                }
            }
            (Mutation::Remove { .. }, Some(key)) => {
                remote.remove_activity(key).await?;
                Ok(Confirmation::Ack)
            }
            (Mutation::AddName { name, .. }, Some(key)) => {
                remote.add_name(key, name).await?;
                Ok(Confirmation::Ack)
            }
            (Mutation::RemoveName { index, .. }, Some(key)) => {
                remote.remove_name(key, *index).await?;
                Ok(Confirmation::Ack)
            }
        }
    }

    // ─── Terminal transitions ────────────────────────────────────────────

    fn reject(&self, attempt: Attempt, error: AppError) -> MutationOutcome {
        let outcome = attempt.failed(MutationState::Rejected, error);
        self.notify(&outcome);
        outcome
    }

    async fn roll_back(
        &self,
        attempt: Attempt,
        pending: PendingMutation,
        error: AppError,
    ) -> MutationOutcome {
        self.store.rollback(pending).await;
        let outcome = attempt.failed(MutationState::RolledBack, error);
        self.notify(&outcome);
        outcome
    }

    fn notify(&self, outcome: &MutationOutcome) {
        if let Some(notification) = &outcome.notification {
            // Nobody listening is fine; the outcome carries it too.
            let _ = self.notifications.send(notification.clone());
        }
    }

    // ─── Background refresh ──────────────────────────────────────────────

    fn refresh_in_background(&self) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            store.refresh_quietly().await;
        });
    }

    fn refresh_if_lingering(&self, id: String) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            tokio::time::sleep(REMOVE_FALLBACK_DELAY).await;
            if store.contains(&id).await {
                tracing::debug!(activity_id = %id, "Removed activity still present, refreshing");
                store.refresh_quietly().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationLevel;
    use crate::models::{Frequency, RawActivity};
    use crate::services::memory::{FailPoint, FailureKind, InMemoryRemote};
    use crate::services::remote::{Addressing, RemoteService};
    use chrono::TimeZone;

    fn raw(id: &str, names: &[&str]) -> RawActivity {
        RawActivity {
            id: Some(id.to_string()),
            names: Some(names.iter().map(|n| n.to_string()).collect()),
            current_name_index: Some(0),
            category: Some("Chores".to_string()),
            last_completed: Some("2026-03-01T08:00:00Z".to_string()),
            frequency_ms: Some(2 * 86_400_000),
            ..RawActivity::default()
        }
    }

    async fn setup(
        addressing: Addressing,
        items: Vec<RawActivity>,
    ) -> (MutationCoordinator, Arc<InMemoryRemote>) {
        let remote = Arc::new(InMemoryRemote::new(addressing).with_items(items));
        let store = Arc::new(ActivityStore::new(remote.clone()));
        store.refresh().await.unwrap();
        (MutationCoordinator::new(store), remote)
    }

    #[tokio::test]
    async fn test_complete_commits_authoritative_record() {
        let (coordinator, remote) =
            setup(Addressing::EntityLookup, vec![raw("a", &["Alice", "Bob"])]).await;
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap();

        let outcome = coordinator.complete("a", Some(at)).await;
        assert_eq!(outcome.state, MutationState::Committed);
        assert!(outcome.notification.is_none());

        let record = coordinator.store().get("a").await.unwrap();
        assert_eq!(record.last_completed, at);
        assert_eq!(record.name(), "Bob");
        assert!(remote
            .calls()
            .contains(&"complete_activity:sensor.chores_alice".to_string()));
    }

    #[tokio::test]
    async fn test_complete_failure_restores_exact_state() {
        let (coordinator, remote) =
            setup(Addressing::ById, vec![raw("a", &["Alice", "Bob"])]).await;
        let before = coordinator.store().get("a").await.unwrap();
        let mut notes = coordinator.notifications();
        remote.fail(FailPoint::Complete, FailureKind::Unavailable);

        let outcome = coordinator.complete("a", None).await;
        assert_eq!(outcome.state, MutationState::RolledBack);
        assert!(matches!(outcome.error(), Some(AppError::RemoteUnavailable(_))));
        assert_eq!(
            outcome.notification.as_ref().map(|n| n.message.as_str()),
            Some("Error updating activity. Please try again.")
        );
        assert_eq!(coordinator.store().get("a").await.unwrap(), before);

        let note = notes.recv().await.unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert_eq!(Some(&note), outcome.notification.as_ref());
    }

    #[tokio::test]
    async fn test_malformed_reply_rolls_back() {
        let (coordinator, remote) = setup(Addressing::ById, vec![raw("a", &["Alice"])]).await;
        let before = coordinator.store().snapshot().await;
        remote.fail(FailPoint::Complete, FailureKind::Malformed);

        let outcome = coordinator.complete("a", None).await;
        assert_eq!(outcome.state, MutationState::RolledBack);
        assert_eq!(coordinator.store().snapshot().await, before);
    }

    #[tokio::test]
    async fn test_unresolvable_entity_aborts_before_apply() {
        let (coordinator, remote) =
            setup(Addressing::EntityLookup, vec![raw("a", &["Alice"])]).await;
        // The remote loses its entity while the mirror still has the record.
        remote.remove_activity(&RemoteKey("a".to_string())).await.unwrap();
        let mut changes = coordinator.store().changes();
        changes.mark_unchanged();

        let outcome = coordinator.add_name("a", "Bob").await;
        assert_eq!(outcome.state, MutationState::Rejected);
        assert!(matches!(outcome.error(), Some(AppError::EntityNotFound(_))));
        assert_eq!(
            outcome.notification.as_ref().map(|n| n.message.as_str()),
            Some("Could not find entity for this activity")
        );
        assert!(!changes.has_changed().unwrap());
        assert!(!remote.calls().iter().any(|c| c.starts_with("add_name")));
    }

    #[tokio::test]
    async fn test_unknown_id_is_rejected() {
        let (coordinator, remote) = setup(Addressing::ById, vec![]).await;
        let outcome = coordinator.complete("ghost", None).await;
        assert_eq!(outcome.state, MutationState::Rejected);
        assert!(matches!(outcome.error(), Some(AppError::EntityNotFound(_))));
        assert_eq!(remote.calls(), vec!["list_items"]);
    }

    #[tokio::test]
    async fn test_remove_last_name_never_reaches_remote() {
        let (coordinator, remote) = setup(Addressing::ById, vec![raw("a", &["Only"])]).await;

        for index in [0, 1, 5] {
            let outcome = coordinator.remove_name("a", index).await;
            assert_eq!(outcome.state, MutationState::Rejected);
            assert!(matches!(outcome.error(), Some(AppError::InvalidOperation(_))));
        }
        assert!(!remote.calls().iter().any(|c| c.starts_with("remove_name")));
    }

    #[tokio::test]
    async fn test_remove_name_commits() {
        let (coordinator, remote) =
            setup(Addressing::ById, vec![raw("a", &["Alice", "Bob", "Cara"])]).await;

        let outcome = coordinator.remove_name("a", 1).await;
        assert!(outcome.is_committed());
        assert_eq!(
            outcome.notification,
            Some(Notification::info("Name removed!"))
        );
        assert_eq!(
            coordinator.store().get("a").await.unwrap().names.names(),
            ["Alice", "Cara"]
        );
        assert_eq!(
            remote.items()[0].names.as_deref(),
            Some(&["Alice".to_string(), "Cara".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let (coordinator, _) = setup(Addressing::ById, vec![raw("a", &["Alice"])]).await;
        let outcome = coordinator.add_name("a", "   ").await;
        assert_eq!(outcome.state, MutationState::Rejected);
    }

    #[tokio::test]
    async fn test_add_replaces_provisional_id() {
        let (coordinator, remote) = setup(Addressing::ById, vec![]).await;
        let new = NewActivity::from_name_input("Alice, Bob", "Chores", Frequency::days(7));

        let outcome = coordinator.add(new).await;
        assert!(outcome.is_committed());
        let id = outcome.activity_id.clone().unwrap();
        assert!(id.starts_with("remote-"));

        let record = coordinator.store().get(&id).await.unwrap();
        assert_eq!(record.names.names(), ["Alice", "Bob"]);
        assert_eq!(remote.items().len(), 1);
    }

    #[tokio::test]
    async fn test_add_failure_discards_provisional_record() {
        let (coordinator, remote) = setup(Addressing::ById, vec![]).await;
        remote.fail(FailPoint::Add, FailureKind::Unavailable);

        let outcome = coordinator
            .add(NewActivity::from_name_input("Alice", "Chores", Frequency::days(1)))
            .await;
        assert_eq!(outcome.state, MutationState::RolledBack);
        assert!(coordinator.store().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_without_names_is_rejected() {
        let (coordinator, remote) = setup(Addressing::ById, vec![]).await;
        let outcome = coordinator
            .add(NewActivity::from_name_input(" , ", "Chores", Frequency::days(1)))
            .await;
        assert_eq!(outcome.state, MutationState::Rejected);
        assert!(!remote.calls().iter().any(|c| c == "add_activity"));
    }

    #[tokio::test]
    async fn test_remove_uses_activity_id_even_in_entity_mode() {
        let (coordinator, remote) =
            setup(Addressing::EntityLookup, vec![raw("a", &["Alice"])]).await;
        let outcome = coordinator.remove("a").await;
        assert!(outcome.is_committed());
        assert!(remote.calls().contains(&"remove_activity:a".to_string()));
        assert!(!coordinator.store().contains("a").await);
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_rejected() {
        let (coordinator, _) = setup(Addressing::ById, vec![]).await;
        let outcome = coordinator.remove("ghost").await;
        assert_eq!(outcome.state, MutationState::Rejected);
        assert!(matches!(outcome.error(), Some(AppError::EntityNotFound(_))));
        assert!(MutationState::Rejected.is_terminal());
        assert!(!MutationState::OptimisticallyApplied.is_terminal());
    }

    #[tokio::test]
    async fn test_add_with_unbounded_frequency_is_rejected() {
        let (coordinator, remote) = setup(Addressing::ById, vec![]).await;
        let outcome = coordinator
            .add(NewActivity::from_name_input(
                "Alice",
                "Chores",
                Frequency::days(100_000_000_000),
            ))
            .await;

        assert_eq!(outcome.state, MutationState::Rejected);
        assert!(matches!(outcome.error(), Some(AppError::InvalidOperation(_))));
        assert!(coordinator.store().snapshot().await.is_empty());
        assert!(coordinator
            .store()
            .view(&crate::models::ViewConfig::default())
            .await
            .is_empty());
        assert!(!remote.calls().iter().any(|c| c == "add_activity"));
    }
}
