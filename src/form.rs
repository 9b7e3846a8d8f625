//! Create/edit form state and the write it turns into.
//!
//! The controller never touches a list or dashboard. A successful write
//! shows up through the store's next snapshot like any other change.

use chrono::{DateTime, Utc};

use crate::error::FormError;
use crate::models::{ApplicationFields, ApplicationRecord, RecordId, Status};
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub name: String,
    pub position: String,
    pub date: DateTime<Utc>,
    pub status: Option<Status>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: String::new(),
            date: Utc::now(),
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(RecordId),
    Updated(RecordId),
}

#[derive(Debug, Default)]
pub struct ApplicationFormController {
    draft: Draft,
    editing: Option<RecordId>,
    open: bool,
    selector_open: bool,
}

impl ApplicationFormController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an empty form dated now.
    pub fn open_for_create(&mut self) {
        self.draft = Draft::default();
        self.editing = None;
        self.open = true;
        self.selector_open = false;
    }

    /// Opens the form seeded from `record`; submit will update it.
    pub fn open_for_edit(&mut self, record: &ApplicationRecord) {
        self.draft = Draft {
            name: record.name.clone(),
            position: record.position.clone(),
            date: record.date,
            status: record.status.index().map(|_| record.status),
        };
        self.editing = Some(record.id.clone());
        self.open = true;
        self.selector_open = false;
    }

    /// Dismisses the form without writing.
    pub fn close(&mut self) {
        self.draft = Draft::default();
        self.editing = None;
        self.open = false;
        self.selector_open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn selector_open(&self) -> bool {
        self.selector_open
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_position(&mut self, position: impl Into<String>) {
        self.draft.position = position.into();
    }

    pub fn name_mut(&mut self) -> &mut String {
        &mut self.draft.name
    }

    pub fn position_mut(&mut self) -> &mut String {
        &mut self.draft.position
    }

    pub fn toggle_status_selector(&mut self) {
        self.selector_open = !self.selector_open;
    }

    /// Sets the draft status and closes the selector. `Unknown` is not
    /// selectable and leaves the draft unchanged.
    pub fn select_status(&mut self, status: Status) -> bool {
        if status.index().is_none() {
            return false;
        }
        self.draft.status = Some(status);
        self.selector_open = false;
        true
    }

    /// Required fields that are still blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.draft.name.trim().is_empty() {
            missing.push("name");
        }
        if self.draft.position.trim().is_empty() {
            missing.push("position");
        }
        if self.draft.status.is_none() {
            missing.push("status");
        }
        missing
    }

    /// Validates the draft and issues one create (no record selected) or one
    /// full update (record selected).
    ///
    /// On success the form closes. On any error the form stays open with its
    /// draft intact so the user can correct it or try again.
    pub async fn submit(&mut self, store: &dyn RecordStore, user_id: Option<&str>) -> Result<SubmitOutcome, FormError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(FormError::Validation { missing });
        }
        let user_id = user_id.ok_or(FormError::NotAuthenticated)?;
        let Some(status) = self.draft.status else {
            return Err(FormError::Validation { missing: vec!["status"] });
        };

        let fields = ApplicationFields {
            name: self.draft.name.trim().to_string(),
            position: self.draft.position.trim().to_string(),
            date: self.draft.date,
            status,
        };

        let outcome = match &self.editing {
            Some(id) => {
                store.update(user_id, id, fields).await?;
                SubmitOutcome::Updated(id.clone())
            }
            None => SubmitOutcome::Created(store.create(user_id, fields).await?),
        };

        self.close();
        Ok(outcome)
    }
}

/// Deletes one record. Call only after the user confirmed.
///
/// The record stays visible until the store's next snapshot removes it.
pub async fn delete_application(store: &dyn RecordStore, user_id: Option<&str>, id: &str) -> Result<(), FormError> {
    let user_id = user_id.ok_or(FormError::NotAuthenticated)?;
    store.delete(user_id, id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, Notification, Subscription};

    async fn open(store: &MemoryStore) -> Subscription {
        let mut sub = store.subscribe("u1").await.unwrap();
        sub.try_next();
        sub
    }

    fn filled(form: &mut ApplicationFormController) {
        form.open_for_create();
        form.set_name("Acme");
        form.set_position("Engineer");
        form.select_status(Status::Interview);
    }

    #[test]
    fn open_for_create_resets_everything() {
        let mut form = ApplicationFormController::new();
        filled(&mut form);
        form.toggle_status_selector();
        let before = Utc::now();
        form.open_for_create();

        assert!(form.is_open());
        assert!(!form.selector_open());
        assert_eq!(form.editing_id(), None);
        assert_eq!(form.draft().name, "");
        assert_eq!(form.draft().position, "");
        assert_eq!(form.draft().status, None);
        assert!(form.draft().date >= before);
    }

    #[test]
    fn select_status_closes_selector() {
        let mut form = ApplicationFormController::new();
        form.open_for_create();
        form.toggle_status_selector();
        assert!(form.selector_open());
        assert!(form.select_status(Status::Offer));
        assert!(!form.selector_open());
        assert_eq!(form.draft().status, Some(Status::Offer));

        assert!(!form.select_status(Status::Unknown));
        assert_eq!(form.draft().status, Some(Status::Offer));
    }

    #[test]
    fn edit_of_unknown_status_requires_a_new_choice() {
        let mut form = ApplicationFormController::new();
        let record = ApplicationRecord {
            id: "r1".to_string(),
            name: "Acme".to_string(),
            position: "Engineer".to_string(),
            date: Utc::now(),
            status: Status::Unknown,
        };
        form.open_for_edit(&record);
        assert_eq!(form.editing_id(), Some("r1"));
        assert_eq!(form.missing_fields(), vec!["status"]);
    }

    #[tokio::test]
    async fn blank_fields_fail_validation_without_writing() {
        let store = MemoryStore::new();
        let mut sub = open(&store).await;
        let mut form = ApplicationFormController::new();
        form.open_for_create();
        form.set_name("   ");

        let err = form.submit(&store, Some("u1")).await.unwrap_err();
        assert!(matches!(err, FormError::Validation { ref missing } if missing == &vec!["name", "position", "status"]));
        assert!(form.is_open());
        assert_eq!(store.write_attempts(), 0);
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn missing_user_is_an_auth_error() {
        let store = MemoryStore::new();
        let mut form = ApplicationFormController::new();
        filled(&mut form);

        let err = form.submit(&store, None).await.unwrap_err();
        assert!(matches!(err, FormError::NotAuthenticated));
        assert!(form.is_open());
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn create_mode_adds_one_record_and_closes() {
        let store = MemoryStore::new();
        let mut sub = open(&store).await;
        let mut form = ApplicationFormController::new();
        filled(&mut form);
        form.set_name("  Acme  ");

        let before = Utc::now();
        let outcome = form.submit(&store, Some("u1")).await.unwrap();
        let SubmitOutcome::Created(id) = outcome else {
            panic!("expected create");
        };
        assert!(!form.is_open());
        assert_eq!(store.write_attempts(), 1);

        let Some(Notification::Snapshot(snap)) = sub.try_next() else {
            panic!("expected a snapshot");
        };
        let records = snap.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].name, "Acme");
        assert_eq!(records[0].status, Status::Interview);
        assert!(records[0].date >= before);
    }

    #[tokio::test]
    async fn edit_mode_overwrites_all_fields_and_keeps_id() {
        let store = MemoryStore::new();
        let mut form = ApplicationFormController::new();
        filled(&mut form);
        let SubmitOutcome::Created(id) = form.submit(&store, Some("u1")).await.unwrap() else {
            panic!("expected create");
        };
        let mut sub = store.subscribe("u1").await.unwrap();
        let Some(Notification::Snapshot(snap)) = sub.try_next() else {
            panic!("expected a snapshot");
        };
        let original = snap.records().remove(0);

        form.open_for_edit(&original);
        form.set_name("Acme Corp");
        form.set_position("Staff Engineer");
        form.select_status(Status::Offer);
        let outcome = form.submit(&store, Some("u1")).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Updated(id.clone()));
        assert_eq!(form.editing_id(), None);

        let Some(Notification::Snapshot(snap)) = sub.try_next() else {
            panic!("expected a snapshot");
        };
        let records = snap.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].name, "Acme Corp");
        assert_eq!(records[0].position, "Staff Engineer");
        assert_eq!(records[0].status, Status::Offer);
        assert!(records[0].date >= original.date);
    }

    #[tokio::test]
    async fn rejected_write_keeps_form_open_for_retry() {
        let store = MemoryStore::new();
        let mut sub = open(&store).await;
        let mut form = ApplicationFormController::new();
        filled(&mut form);
        let draft = form.draft().clone();

        store.reject_writes(Some("permission denied"));
        let err = form.submit(&store, Some("u1")).await.unwrap_err();
        assert!(matches!(err, FormError::Write(StoreError::Rejected(_))));
        assert!(form.is_open());
        assert_eq!(form.draft(), &draft);
        assert_eq!(store.write_attempts(), 1);
        assert!(sub.try_next().is_none());

        store.reject_writes(None);
        assert!(matches!(form.submit(&store, Some("u1")).await, Ok(SubmitOutcome::Created(_))));
        assert_eq!(store.write_attempts(), 2);
    }

    #[tokio::test]
    async fn delete_requires_a_user_and_relies_on_the_next_snapshot() {
        let store = MemoryStore::new();
        let mut form = ApplicationFormController::new();
        filled(&mut form);
        let SubmitOutcome::Created(id) = form.submit(&store, Some("u1")).await.unwrap() else {
            panic!("expected create");
        };
        let mut sub = open(&store).await;

        assert!(matches!(
            delete_application(&store, None, &id).await,
            Err(FormError::NotAuthenticated)
        ));
        assert!(sub.try_next().is_none());

        delete_application(&store, Some("u1"), &id).await.unwrap();
        assert!(matches!(sub.try_next(), Some(Notification::Snapshot(s)) if s.is_empty()));
    }

    #[tokio::test]
    async fn rejected_delete_is_reported() {
        let store = MemoryStore::new();
        store.reject_writes(Some("offline"));
        let err = delete_application(&store, Some("u1"), "r1").await.unwrap_err();
        assert_eq!(err.to_string(), "write rejected: offline");
    }
}
