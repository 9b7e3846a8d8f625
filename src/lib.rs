//! Job-application tracking: a live, per-user collection of applications
//! with a searchable list, a status dashboard and a create/edit form.

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod form;
pub mod list_model;
pub mod live;
pub mod logging;
pub mod models;
pub mod notice;
pub mod store;
pub mod tracker;

pub use auth::AuthProvider;
pub use dashboard::{DashboardAggregator, DashboardStats};
pub use db::Database;
pub use error::{AuthError, FormError, LookupError, StoreError};
pub use form::{ApplicationFormController, SubmitOutcome, delete_application};
pub use list_model::{ApplicationList, ApplicationListModel};
pub use live::{Live, Projection, SyncState};
pub use models::{ApplicationRecord, Status, User};
pub use notice::{Notice, NoticeBoard};
pub use store::{MemoryStore, RecordStore};
pub use tracker::Tracker;
