//! Error types for database operations

use roster_core::Error as CoreError;
use thiserror::Error;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection retries exhausted
    #[error("Could not connect to {path} after {attempts} attempts: {source}")]
    Connect {
        path: String,
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
}

/// Result type alias for database bootstrap operations
pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Io(e) => CoreError::Io(e),
            other => CoreError::Unavailable(other.to_string()),
        }
    }
}

/// Classify a sqlx failure for the record described by `what`
///
/// Missing rows become `NotFound`, unique violations `Conflict`, dangling
/// references `NotFound`; everything else means the store is `Unavailable`.
pub(crate) fn classify(what: impl Into<String>) -> impl FnOnce(sqlx::Error) -> CoreError {
    let what = what.into();
    move |err| match &err {
        sqlx::Error::RowNotFound => CoreError::NotFound(what),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CoreError::Conflict(format!("{} already exists", what))
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            CoreError::NotFound(format!("{} references a missing record", what))
        }
        _ => CoreError::Unavailable(format!("{}: {}", what, err)),
    }
}

/// Any sqlx failure outside a keyed write is a store outage
pub(crate) fn unavailable(err: sqlx::Error) -> CoreError {
    CoreError::Unavailable(format!("database error: {}", err))
}
