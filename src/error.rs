//! Error types shared by the stores, authentication and the form controller.

use std::path::PathBuf;

/// A write or read refused by a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store refused the write (permissions, offline, ...).
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Update or delete targeted an id the user does not own.
    #[error("application '{0}' not found")]
    NotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("database not initialized, run 'apptrack init' first")]
    NotInitialized,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("an account already exists for '{0}'")]
    EmailInUse(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Store(StoreError::Sqlite(err))
    }
}

/// Why a submit or delete did not reach the store, or was refused by it.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// Required draft fields are empty. Nothing was written.
    #[error("please fill in all fields (missing: {})", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    #[error("user not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Write(#[from] StoreError),
}

/// Resolving a full id or an id prefix against the current list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("no application matches '{0}'")]
    NotFound(String),

    #[error("'{prefix}' matches {matches} applications, use a longer id")]
    Ambiguous { prefix: String, matches: usize },
}
