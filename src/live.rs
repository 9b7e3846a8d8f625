//! Live views: a subscription paired with a projection that is rebuilt from
//! every snapshot the store delivers.
//!
//! A view moves through `Unsubscribed -> Loading -> Ready` and back to
//! `Unsubscribed` on [`Live::deactivate`]. Further snapshots keep it `Ready`.
//! A failed notification leaves the projection untouched and is kept in
//! [`Live::last_error`] until the next snapshot arrives.

use serde::Serialize;

use crate::error::StoreError;
use crate::models::Snapshot;
use crate::store::{Notification, RecordStore, Subscription};

/// Read model derived from a full snapshot.
///
/// # Contract
///
/// - [`apply`](Projection::apply) replaces the previous state entirely; it is
///   never a merge.
/// - [`reset`](Projection::reset) returns to the empty state.
pub trait Projection: Default {
    fn apply(&mut self, snapshot: &Snapshot);

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Two projections fed from one subscription.
impl<A: Projection, B: Projection> Projection for (A, B) {
    fn apply(&mut self, snapshot: &Snapshot) {
        self.0.apply(snapshot);
        self.1.apply(snapshot);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Unsubscribed,
    Loading,
    Ready,
}

/// A projection kept in sync with one user's collection.
#[derive(Debug, Default)]
pub struct Live<P> {
    subscription: Option<Subscription>,
    ready: bool,
    last_error: Option<String>,
    view: P,
}

impl<P: Projection> Live<P> {
    pub fn new() -> Self {
        Self {
            subscription: None,
            ready: false,
            last_error: None,
            view: P::default(),
        }
    }

    /// Subscribes to `user_id`'s collection, releasing any previous
    /// subscription first. The view is empty and loading until the first
    /// snapshot is applied.
    pub async fn activate(&mut self, store: &dyn RecordStore, user_id: &str) -> Result<(), StoreError> {
        self.deactivate();
        self.subscription = Some(store.subscribe(user_id).await?);
        tracing::debug!(user_id, "view activated");
        Ok(())
    }

    /// Releases the subscription and clears the view.
    pub fn deactivate(&mut self) {
        if let Some(sub) = self.subscription.take() {
            tracing::debug!(user_id = sub.user_id(), "view deactivated");
        }
        self.ready = false;
        self.last_error = None;
        self.view.reset();
    }

    pub fn state(&self) -> SyncState {
        match (&self.subscription, self.ready) {
            (None, _) => SyncState::Unsubscribed,
            (Some(_), false) => SyncState::Loading,
            (Some(_), true) => SyncState::Ready,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(Subscription::user_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True when the store has gone away; no further notifications will come.
    pub fn is_disconnected(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_closed)
    }

    pub fn view(&self) -> &P {
        &self.view
    }

    /// Waits for the next notification and applies it. Returns `false` when
    /// nothing more will arrive (not subscribed, or the store went away).
    pub async fn sync(&mut self) -> bool {
        let Some(sub) = self.subscription.as_mut() else {
            return false;
        };
        match sub.next().await {
            Some(notification) => {
                self.handle(notification);
                true
            }
            None => false,
        }
    }

    /// Applies every notification already queued, in order, without waiting.
    /// Returns how many were handled.
    pub fn sync_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(notification) = self.subscription.as_mut().and_then(Subscription::try_next) {
            self.handle(notification);
            handled += 1;
        }
        handled
    }

    fn handle(&mut self, notification: Notification) {
        match notification {
            Notification::Snapshot(snapshot) => {
                tracing::debug!(
                    user_id = self.user_id().unwrap_or_default(),
                    records = snapshot.len(),
                    "snapshot applied"
                );
                self.view.apply(&snapshot);
                self.ready = true;
                self.last_error = None;
            }
            Notification::Failed(reason) => {
                tracing::warn!(reason = %reason, "subscription failed, keeping previous state");
                self.last_error = Some(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationFields, Status};
    use crate::store::MemoryStore;
    use chrono::Utc;

    #[derive(Debug, Default)]
    struct Count(usize);

    impl Projection for Count {
        fn apply(&mut self, snapshot: &Snapshot) {
            self.0 = snapshot.len();
        }
    }

    fn fields(name: &str) -> ApplicationFields {
        ApplicationFields {
            name: name.to_string(),
            position: "SRE".to_string(),
            date: Utc::now(),
            status: Status::Interview,
        }
    }

    #[tokio::test]
    async fn walks_through_the_state_machine() {
        let store = MemoryStore::new();
        let mut live: Live<Count> = Live::new();
        assert_eq!(live.state(), SyncState::Unsubscribed);

        live.activate(&store, "u1").await.unwrap();
        assert_eq!(live.state(), SyncState::Loading);
        assert_eq!(live.user_id(), Some("u1"));

        assert!(live.sync().await);
        assert_eq!(live.state(), SyncState::Ready);
        assert_eq!(live.view().0, 0);

        store.create("u1", fields("Acme")).await.unwrap();
        assert_eq!(live.sync_pending(), 1);
        assert_eq!(live.state(), SyncState::Ready);
        assert_eq!(live.view().0, 1);

        live.deactivate();
        assert_eq!(live.state(), SyncState::Unsubscribed);
        assert_eq!(live.view().0, 0);
        assert_eq!(store.subscriber_count("u1"), 0);
        assert!(!live.sync().await);
    }

    #[tokio::test]
    async fn failures_keep_previous_state() {
        let store = MemoryStore::new();
        store.create("u1", fields("Acme")).await.unwrap();
        let mut live: Live<Count> = Live::new();
        live.activate(&store, "u1").await.unwrap();
        live.sync_pending();

        store.fail_subscriptions("u1", "permission denied").unwrap();
        live.sync_pending();
        assert_eq!(live.state(), SyncState::Ready);
        assert_eq!(live.view().0, 1);
        assert_eq!(live.last_error(), Some("permission denied"));

        store.create("u1", fields("Globex")).await.unwrap();
        live.sync_pending();
        assert_eq!(live.view().0, 2);
        assert_eq!(live.last_error(), None);
    }

    #[tokio::test]
    async fn failure_before_first_snapshot_stays_loading() {
        let store = MemoryStore::new();
        let mut live: Live<Count> = Live::new();
        live.activate(&store, "u1").await.unwrap();

        live.handle(Notification::Failed("offline".to_string()));
        assert_eq!(live.state(), SyncState::Loading);
        assert_eq!(live.last_error(), Some("offline"));

        live.sync_pending();
        assert_eq!(live.state(), SyncState::Ready);
        assert_eq!(live.last_error(), None);
    }

    #[tokio::test]
    async fn store_going_away_disconnects_but_keeps_the_view() {
        let store = MemoryStore::new();
        store.create("u1", fields("Acme")).await.unwrap();
        let mut live: Live<Count> = Live::new();
        live.activate(&store, "u1").await.unwrap();
        assert!(live.sync().await);
        assert!(!live.is_disconnected());

        drop(store);
        assert!(!live.sync().await);
        assert!(live.is_disconnected());
        assert_eq!(live.state(), SyncState::Ready);
        assert_eq!(live.view().0, 1);
        assert_eq!(live.sync_pending(), 0);

        live.deactivate();
        assert!(!live.is_disconnected());
    }

    #[tokio::test]
    async fn tuple_projection_feeds_both_halves() {
        let store = MemoryStore::new();
        store.create("u1", fields("Acme")).await.unwrap();
        let mut live: Live<(Count, Count)> = Live::new();
        live.activate(&store, "u1").await.unwrap();
        live.sync_pending();
        assert_eq!(live.view().0.0, 1);
        assert_eq!(live.view().1.0, 1);
        assert_eq!(store.subscriber_count("u1"), 1);
    }

    #[tokio::test]
    async fn reactivation_replaces_the_subscription() {
        let store = MemoryStore::new();
        store.create("alice", fields("Acme")).await.unwrap();
        let mut live: Live<Count> = Live::new();
        live.activate(&store, "alice").await.unwrap();
        live.sync_pending();
        assert_eq!(live.view().0, 1);

        live.activate(&store, "bob").await.unwrap();
        assert_eq!(live.state(), SyncState::Loading);
        assert_eq!(live.view().0, 0);
        assert_eq!(store.subscriber_count("alice"), 0);
    }
}
