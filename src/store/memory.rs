//! In-process record store with an injectable clock and fault injection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Clock, RecordStore, SubscriberHub, Subscription, sort_newest_first};
use crate::error::StoreError;
use crate::models::{ApplicationFields, Document, RecordId, Snapshot, UserId};

pub struct MemoryStore {
    collections: Mutex<HashMap<UserId, Vec<Document>>>,
    hub: SubscriberHub,
    clock: Clock,
    reject_writes: Mutex<Option<String>>,
    write_attempts: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Uses `clock` for every write's date stamp.
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            collections: Mutex::new(HashMap::new()),
            hub: SubscriberHub::new(),
            clock: Box::new(clock),
            reject_writes: Mutex::new(None),
            write_attempts: AtomicUsize::new(0),
        }
    }

    /// Makes every following write fail with `reason`; `None` accepts writes again.
    pub fn reject_writes(&self, reason: Option<&str>) {
        if let Ok(mut guard) = self.reject_writes.lock() {
            *guard = reason.map(str::to_string);
        }
    }

    /// Pushes a subscription failure to every open subscription of `user_id`.
    pub fn fail_subscriptions(&self, user_id: &str, reason: &str) -> Result<(), StoreError> {
        self.hub.fail(user_id, reason)
    }

    /// Stores a document as-is, bypassing the write path. Lets callers seed
    /// data with values the write path would never produce.
    pub fn insert_raw(&self, user_id: &str, document: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().map_err(|_| StoreError::LockPoisoned)?;
        let docs = collections.entry(user_id.to_string()).or_default();
        docs.retain(|d| d.id != document.id);
        docs.push(document);
        sort_newest_first(docs);
        self.hub.publish(user_id, &Snapshot::new(docs.clone()))
    }

    /// Number of create/update/delete calls, rejected ones included.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.hub.subscriber_count(user_id)
    }

    fn begin_write(&self) -> Result<(), StoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let reason = self.reject_writes.lock().map_err(|_| StoreError::LockPoisoned)?;
        match reason.as_ref() {
            Some(reason) => {
                tracing::warn!(reason = %reason, "write rejected");
                Err(StoreError::Rejected(reason.clone()))
            }
            None => Ok(()),
        }
    }

    /// Applies `change` to the user's collection and publishes the result.
    fn write<T, F>(&self, user_id: &str, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Document>, DateTime<Utc>) -> Result<(T, bool), StoreError>,
    {
        self.begin_write()?;
        let mut collections = self.collections.lock().map_err(|_| StoreError::LockPoisoned)?;
        let docs = collections.entry(user_id.to_string()).or_default();
        let (out, changed) = change(docs, (self.clock)())?;
        if changed {
            sort_newest_first(docs);
            self.hub.publish(user_id, &Snapshot::new(docs.clone()))?;
        }
        Ok(out)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn subscribe(&self, user_id: &str) -> Result<Subscription, StoreError> {
        let collections = self.collections.lock().map_err(|_| StoreError::LockPoisoned)?;
        let docs = collections.get(user_id).cloned().unwrap_or_default();
        self.hub.register(user_id, Snapshot::new(docs))
    }

    async fn create(&self, user_id: &str, fields: ApplicationFields) -> Result<RecordId, StoreError> {
        let id = self.write(user_id, |docs, now| {
            let id = uuid::Uuid::new_v4().to_string();
            docs.push(Document {
                id: id.clone(),
                name: fields.name,
                position: fields.position,
                status: Some(fields.status.label().to_string()),
                date: now,
            });
            Ok((id, true))
        })?;
        tracing::info!(user_id, id = %id, "application created");
        Ok(id)
    }

    async fn update(&self, user_id: &str, id: &str, fields: ApplicationFields) -> Result<(), StoreError> {
        self.write(user_id, |docs, now| {
            let doc = docs
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            doc.name = fields.name;
            doc.position = fields.position;
            doc.status = Some(fields.status.label().to_string());
            doc.date = now;
            Ok(((), true))
        })?;
        tracing::info!(user_id, id, "application updated");
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let removed = self.write(user_id, |docs, _| {
            let before = docs.len();
            docs.retain(|d| d.id != id);
            let removed = docs.len() != before;
            Ok((removed, removed))
        })?;
        tracing::info!(user_id, id, removed, "application deleted");
        Ok(())
    }
}
