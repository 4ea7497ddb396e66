//! # Blogstore - storage layer for a small blogging application
//!
//! Two record types live in an embedded SQLite database:
//! - `authors(id, email, name, hashed_password)`
//! - `entries(id, author_id, slug, title, markdown, html, published, updated)`
//!
//! Blogstore provides:
//! - Schema creation and destructive re-provisioning
//! - A thin connection wrapper (`Database`) with query/get/execute helpers
//! - A bounded connection pool for multi-threaded callers
//! - `BlogStore`, the typed author/entry operations with constraint errors

pub mod blog;
pub mod config;
pub mod output;
pub mod storage;
pub mod timestamp;
pub mod ui;

// Re-exports for convenient access
pub use blog::{Author, BlogStore, Entry, EntryCursor, EntryUpdate, NewAuthor, NewEntry, Order};
pub use storage::{ConnectOptions, Database, Pool, PooledConnection, Row};

use rusqlite::ffi;

/// Result type alias for Blogstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Blogstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unique-key collision (`authors.email`, `entries.slug`, primary key)
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Missing referenced author, or author still referenced by entries
    #[error("Referential integrity violation: {0}")]
    ReferentialIntegrityViolation(String),

    /// Value exceeds its declared length or a required field is missing
    #[error("Validation violation on {field}: {reason}")]
    ValidationViolation { field: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Multiple rows returned for get() query")]
    MultipleRows,

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    #[error("Connection is in use by an active statement")]
    ConnectionInUse,

    #[error("A transaction is already open on this connection")]
    TransactionOpen,

    #[error("Connection is closed")]
    Closed,

    #[error("Storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Error::ValidationViolation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        let rusqlite::Error::SqliteFailure(code, message) = &err else {
            return Error::Storage(err);
        };
        let extended_code = code.extended_code;
        let detail = message.clone().unwrap_or_else(|| code.to_string());

        match extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Error::ConstraintViolation(detail)
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Error::ReferentialIntegrityViolation(detail),
            ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                Error::ValidationViolation {
                    field: constraint_subject(&detail),
                    reason: detail,
                }
            }
            _ => Error::Storage(err),
        }
    }
}

/// Pull the `table.column` (or check name) out of an engine constraint message,
/// e.g. `NOT NULL constraint failed: authors.name`.
fn constraint_subject(message: &str) -> String {
    message
        .rsplit_once(": ")
        .map(|(_, subject)| subject.trim().to_string())
        .unwrap_or_else(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(extended_code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error::new(extended_code),
            Some(message.to_string()),
        )
    }

    #[test]
    fn test_unique_maps_to_constraint_violation() {
        let err: Error = failure(
            ffi::SQLITE_CONSTRAINT_UNIQUE,
            "UNIQUE constraint failed: authors.email",
        )
        .into();
        assert!(matches!(err, Error::ConstraintViolation(msg) if msg.contains("authors.email")));
    }

    #[test]
    fn test_foreign_key_maps_to_referential_violation() {
        let err: Error = failure(ffi::SQLITE_CONSTRAINT_FOREIGNKEY, "FOREIGN KEY constraint failed").into();
        assert!(matches!(err, Error::ReferentialIntegrityViolation(_)));
    }

    #[test]
    fn test_not_null_maps_to_validation_with_column() {
        let err: Error = failure(
            ffi::SQLITE_CONSTRAINT_NOTNULL,
            "NOT NULL constraint failed: authors.name",
        )
        .into();
        match err {
            Error::ValidationViolation { field, .. } => assert_eq!(field, "authors.name"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_other_errors_stay_storage() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Storage(_)));
    }
}
