//! Record store contract and the subscription plumbing shared by the
//! in-memory and SQLite stores.
//!
//! A store owns each user's collection of application documents. Consumers
//! open a [`Subscription`] and receive the full collection, newest first,
//! every time it changes. Writes never patch a consumer's state directly;
//! the store's own notification is the only way new data reaches a view.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

use crate::error::StoreError;
use crate::models::{ApplicationFields, Document, RecordId, Snapshot, UserId};

pub mod memory;

pub use memory::MemoryStore;

/// One delivery on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The complete current collection.
    Snapshot(Snapshot),
    /// The store could not produce a snapshot. The subscription stays open.
    Failed(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Opens a live subscription on `user_id`'s collection. The first
    /// notification is the current snapshot.
    async fn subscribe(&self, user_id: &str) -> Result<Subscription, StoreError>;

    /// Creates a record and returns its store-assigned id.
    async fn create(&self, user_id: &str, fields: ApplicationFields) -> Result<RecordId, StoreError>;

    /// Overwrites every field of an existing record.
    async fn update(&self, user_id: &str, id: &str, fields: ApplicationFields) -> Result<(), StoreError>;

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), StoreError>;
}

/// Receiving end of a live subscription.
///
/// Dropping it releases the subscription; the store prunes the sender on its
/// next publish.
#[derive(Debug)]
pub struct Subscription {
    user_id: UserId,
    rx: UnboundedReceiver<Notification>,
    closed: bool,
}

impl Subscription {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Waits for the next notification. `None` once the store side is gone.
    pub async fn next(&mut self) -> Option<Notification> {
        let next = self.rx.recv().await;
        if next.is_none() {
            self.closed = true;
        }
        next
    }

    /// Returns a queued notification without waiting.
    pub fn try_next(&mut self) -> Option<Notification> {
        match self.rx.try_recv() {
            Ok(notification) => Some(notification),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// True once the store has dropped every sender for this subscription.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Per-user fan-out of notifications to live subscriptions.
#[derive(Debug, Default)]
pub struct SubscriberHub {
    senders: Mutex<HashMap<UserId, Vec<UnboundedSender<Notification>>>>,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscription and queues `initial` as its first
    /// notification.
    pub fn register(&self, user_id: &str, initial: Snapshot) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        // rx is alive, so this cannot fail
        let _ = tx.send(Notification::Snapshot(initial));

        let mut senders = self.senders.lock().map_err(|_| StoreError::LockPoisoned)?;
        senders.entry(user_id.to_string()).or_default().push(tx);
        tracing::debug!(user_id, "subscription opened");

        Ok(Subscription {
            user_id: user_id.to_string(),
            rx,
            closed: false,
        })
    }

    /// Delivers `snapshot` to every open subscription of `user_id`.
    pub fn publish(&self, user_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.send(user_id, || Notification::Snapshot(snapshot.clone()))
    }

    /// Reports a subscription-level failure to every open subscription of
    /// `user_id`.
    pub fn fail(&self, user_id: &str, reason: &str) -> Result<(), StoreError> {
        tracing::warn!(user_id, reason, "subscription failure");
        self.send(user_id, || Notification::Failed(reason.to_string()))
    }

    /// Number of subscriptions of `user_id` that are still held by a consumer.
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        let Ok(mut senders) = self.senders.lock() else {
            return 0;
        };
        match senders.get_mut(user_id) {
            Some(list) => {
                list.retain(|tx| !tx.is_closed());
                list.len()
            }
            None => 0,
        }
    }

    /// Users with at least one subscription still held by a consumer.
    pub fn user_ids(&self) -> Vec<UserId> {
        let Ok(mut senders) = self.senders.lock() else {
            return Vec::new();
        };
        senders.retain(|_, list| {
            list.retain(|tx| !tx.is_closed());
            !list.is_empty()
        });
        senders.keys().cloned().collect()
    }

    fn send<F>(&self, user_id: &str, make: F) -> Result<(), StoreError>
    where
        F: Fn() -> Notification,
    {
        let mut senders = self.senders.lock().map_err(|_| StoreError::LockPoisoned)?;
        let Some(list) = senders.get_mut(user_id) else {
            return Ok(());
        };

        list.retain(|tx| tx.send(make()).is_ok());
        if list.is_empty() {
            senders.remove(user_id);
        }
        Ok(())
    }
}

/// Source of write timestamps.
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A clock that starts at `start` and advances by `step` on every call.
pub fn stepping_clock(start: DateTime<Utc>, step: Duration) -> impl Fn() -> DateTime<Utc> + Send + Sync {
    let ticks = AtomicI64::new(0);
    move || {
        let n = ticks.fetch_add(1, Ordering::SeqCst);
        start + step * n as i32
    }
}

/// Orders documents newest first. Equal dates fall back to id so the order
/// is stable between snapshots.
pub fn sort_newest_first(documents: &mut [Document]) {
    documents.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
}
