//! Error types for the CLI

use std::path::PathBuf;

use keel_migrate::{MigrationError, StoreError};

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    ReadConfig {
        /// File that was read
        path: PathBuf,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for [`crate::config::KeelConfig`]
    #[error("invalid config {path}: {source}")]
    ParseConfig {
        /// File that was parsed
        path: PathBuf,
        /// Parse failure
        #[source]
        source: serde_yaml::Error,
    },

    /// Flags or config values are inconsistent
    #[error("validation error: {message}")]
    Validation {
        /// What is wrong
        message: String,
    },

    /// Response could not be serialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tracing could not be initialized
    #[error("telemetry error: {0}")]
    Telemetry(#[from] keel_common::telemetry::TelemetryError),

    /// Connecting to or migrating the database failed
    #[error("database error: {0}")]
    Database(#[from] keel_store::Error),

    /// A query outside the engine failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The engine aborted the batch
    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),

    /// The batch ran but some workloads failed
    #[error("{failed} workload(s) failed")]
    Incomplete {
        /// Number of failed workloads
        failed: usize,
    },
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}
