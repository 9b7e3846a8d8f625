use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::auth::{self, AuthProvider};
use crate::error::{AuthError, StoreError};
use crate::models::{ApplicationFields, Document, RecordId, Snapshot, User};
use crate::store::{Clock, RecordStore, SubscriberHub, Subscription};

/// SQLite-backed record store and local account store.
///
/// Writes through this handle republish the affected user's collection to
/// the subscriptions opened on it right away. Commits made by other
/// connections to the same file are picked up by [`Database::refresh`].
pub struct Database {
    conn: Mutex<Connection>,
    path: PathBuf,
    hub: SubscriberHub,
    clock: Clock,
    data_version: AtomicI64,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "database opened");
        Self::from_connection(conn, path.to_path_buf())
    }

    /// Opens an initialized in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Self::from_connection(Connection::open_in_memory()?, PathBuf::from(":memory:"))?;
        db.init()?;
        Ok(db)
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self, StoreError> {
        let version = data_version(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            hub: SubscriberHub::new(),
            clock: Box::new(Utc::now),
            data_version: AtomicI64::new(version),
        })
    }

    /// Replaces the clock used to stamp writes.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<(), StoreError> {
        self.lock()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS session (
                slot INTEGER PRIMARY KEY CHECK (slot = 1),
                user_id TEXT NOT NULL REFERENCES users(id),
                signed_in_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                position TEXT NOT NULL,
                status TEXT,
                date TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_applications_user_date ON applications(user_id, date DESC);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        let tables: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.hub.subscriber_count(user_id)
    }

    /// Republishes every subscribed collection if another connection has
    /// committed since the last check. Returns whether anything was sent.
    pub fn refresh(&self) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let version = data_version(&conn)?;
        if self.data_version.swap(version, Ordering::SeqCst) == version {
            return Ok(false);
        }
        let users = self.hub.user_ids();
        tracing::debug!(version, subscribed = users.len(), "external commit detected");
        for user_id in &users {
            self.publish(&conn, user_id)?;
        }
        Ok(!users.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn now(&self) -> String {
        format_date((self.clock)())
    }

    /// Publishes the user's collection. Called with the connection still
    /// locked so snapshots go out in commit order.
    fn publish(&self, conn: &Connection, user_id: &str) -> Result<(), StoreError> {
        let snapshot = Snapshot::new(load_documents(conn, user_id)?);
        self.hub.publish(user_id, &snapshot)
    }

    fn set_session(conn: &Connection, user_id: &str) -> Result<(), AuthError> {
        conn.execute(
            "INSERT OR REPLACE INTO session (slot, user_id, signed_in_at) VALUES (1, ?1, datetime('now'))",
            [user_id],
        )?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn subscribe(&self, user_id: &str) -> Result<Subscription, StoreError> {
        let conn = self.lock()?;
        let snapshot = Snapshot::new(load_documents(&conn, user_id)?);
        self.hub.register(user_id, snapshot)
    }

    async fn create(&self, user_id: &str, fields: ApplicationFields) -> Result<RecordId, StoreError> {
        let conn = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO applications (id, user_id, name, position, status, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, user_id, fields.name, fields.position, fields.status.label(), self.now()],
        )?;
        tracing::info!(user_id, id = %id, "application created");
        self.publish(&conn, user_id)?;
        Ok(id)
    }

    async fn update(&self, user_id: &str, id: &str, fields: ApplicationFields) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE applications SET name = ?1, position = ?2, status = ?3, date = ?4
             WHERE id = ?5 AND user_id = ?6",
            params![fields.name, fields.position, fields.status.label(), self.now(), id, user_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        tracing::info!(user_id, id, "application updated");
        self.publish(&conn, user_id)
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM applications WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        tracing::info!(user_id, id, removed, "application deleted");
        if removed > 0 {
            self.publish(&conn, user_id)?;
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for Database {
    fn current_user(&self) -> Result<Option<User>, AuthError> {
        let user = self
            .lock()?
            .query_row(
                "SELECT u.id, u.email FROM session s JOIN users u ON u.id = s.user_id WHERE s.slot = 1",
                [],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = auth::normalize_email(email)?;
        auth::validate_password(password)?;

        let conn = self.lock()?;
        let existing: Option<String> = conn
            .query_row("SELECT id FROM users WHERE email = ?1", [&email], |row| row.get(0))
            .optional()?;
        if existing.is_some() {
            return Err(AuthError::EmailInUse(email));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
        };
        let hash = auth::hash_password(password)?;
        conn.execute(
            "INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)",
            params![user.id, user.email, hash],
        )?;
        Self::set_session(&conn, &user.id)?;
        tracing::info!(user_id = %user.id, "account created");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = auth::normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let conn = self.lock()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT id, email, password_hash FROM users WHERE email = ?1",
                [&email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((id, email, hash)) = row else {
            return Err(AuthError::InvalidCredentials);
        };
        if !auth::verify_password(password, &hash)? {
            tracing::warn!(email = %email, "sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        }

        Self::set_session(&conn, &id)?;
        tracing::info!(user_id = %id, "signed in");
        Ok(User { id, email })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.lock()?.execute("DELETE FROM session", [])?;
        tracing::info!("signed out");
        Ok(())
    }
}

/// Changes whenever a different connection commits to the database file.
fn data_version(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

/// Fixed-width RFC 3339 so that text order matches time order.
fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn load_documents(conn: &Connection, user_id: &str) -> Result<Vec<Document>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, position, status, date FROM applications
         WHERE user_id = ?1
         ORDER BY date DESC, id ASC",
    )?;
    let rows = stmt.query_map([user_id], row_to_document)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let raw_date: String = row.get(4)?;
    let date = DateTime::parse_from_rfc3339(&raw_date)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Document {
        id: row.get(0)?,
        name: row.get(1)?,
        position: row.get(2)?,
        status: row.get(3)?,
        date,
    })
}
