//! Store errors

use keel_migrate::StoreError;
use thiserror::Error;

/// Failures setting up the store
#[derive(Debug, Error)]
pub enum Error {
    /// Could not connect to the database
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Schema migration failed
    #[error("failed to migrate database: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Classify a query error for the engine
pub fn db_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
        other => StoreError::Database(other.to_string()),
    }
}
