//! Error types for backend migrations
//!
//! Only batch-abort conditions become a [`MigrationError`]. Per-workload
//! failures are recorded in the response and never surface here.

use thiserror::Error;

use crate::model::{DeploymentBackend, MigrationResponse};

/// Failure reported by a deployment backend or cluster collaborator
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The addressed object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is not allowed to perform the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Anything else (timeouts, server errors, malformed responses)
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create a generic backend error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if the object was reported absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Failure reported by a persistence collaborator
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The row does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Database failure
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Check if the row was reported absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// A workload deleted from its old backend whose config still names it
#[derive(Clone, Debug, PartialEq)]
pub struct InconsistentWorkload {
    /// Workload
    pub workload_id: i64,
    /// Application
    pub app_id: i64,
    /// Environment
    pub environment_id: i64,
    /// Backend the workload was deleted from
    pub deleted_from: DeploymentBackend,
    /// Backend the config should have been flipped to
    pub desired: DeploymentBackend,
    /// Persistence failure
    pub message: String,
}

/// Batch-level migration failure
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Environment id does not resolve
    #[error("environment {environment_id} not found")]
    EnvironmentNotFound {
        /// Requested environment
        environment_id: i64,
    },

    /// Target cluster cannot be reached; nothing was deleted
    #[error("cluster {cluster_id} for environment {environment_id} is unreachable{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    ClusterUnreachable {
        /// Cluster backing the environment
        cluster_id: i64,
        /// Requested environment
        environment_id: i64,
        /// Probe error, if the probe itself failed
        reason: Option<String>,
    },

    /// No workload matched the selection
    #[error("no workloads on {backend} found in environment {environment_id}")]
    NoCandidates {
        /// Requested environment
        environment_id: i64,
        /// Backend the candidates had to be on
        backend: DeploymentBackend,
    },

    /// Annotating leftover CRDs failed; the batch was not started
    #[error("failed to prepare workload {workload_id} ({resource}): {source}")]
    PrepareFailed {
        /// Workload being prepared
        workload_id: i64,
        /// Resource that could not be read or patched
        resource: String,
        /// Underlying failure
        source: BackendError,
    },

    /// Backend deletion succeeded but the config flip did not
    #[error("{} workload(s) deleted from their old backend but config not updated", failures.len())]
    ConfigReconcile {
        /// Every workload left inconsistent
        failures: Vec<InconsistentWorkload>,
        /// The partition computed before reconciliation failed
        response: Box<MigrationResponse>,
    },

    /// Persistence failure before any workload was touched
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Collaborator failure before any workload was touched
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl MigrationError {
    /// HTTP-equivalent status for the calling layer
    pub fn status_code(&self) -> u16 {
        match self {
            MigrationError::ClusterUnreachable { .. } => 422,
            MigrationError::EnvironmentNotFound { .. } | MigrationError::NoCandidates { .. } => 404,
            MigrationError::PrepareFailed { .. }
            | MigrationError::ConfigReconcile { .. }
            | MigrationError::Store(_)
            | MigrationError::Backend(_) => 500,
        }
    }

    /// Check if calling again later may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        match self {
            MigrationError::ClusterUnreachable { .. } => true,
            MigrationError::Store(StoreError::Database(_)) => true,
            MigrationError::Backend(BackendError::Other(_)) => true,
            MigrationError::PrepareFailed { source, .. } => {
                matches!(source, BackendError::Other(_))
            }
            _ => false,
        }
    }
}
