//! Pre-deletion gates
//!
//! The reachability gate runs once per batch and aborts it; the health
//! gate runs per GitOps workload and only blocks that workload.

use tracing::{debug, warn};

use crate::error::MigrationError;
use crate::model::{Environment, Workload};
use crate::ports::{ClusterReachability, HealthStatusStore};

/// Fail the whole batch when the environment's cluster does not answer.
///
/// Deleting against an unreachable cluster hangs and leaves workloads stuck
/// half-deleted, so no per-workload work starts until this passes.
pub async fn ensure_cluster_reachable(
    reachability: &dyn ClusterReachability,
    environment: &Environment,
) -> Result<(), MigrationError> {
    let reason = match reachability.is_reachable(environment.cluster_id).await {
        Ok(true) => {
            debug!(cluster_id = environment.cluster_id, "Cluster reachable");
            return Ok(());
        }
        Ok(false) => None,
        Err(e) => Some(e.to_string()),
    };

    warn!(
        cluster_id = environment.cluster_id,
        environment = %environment.name,
        reason = reason.as_deref().unwrap_or("probe failed"),
        "Cluster unreachable, aborting migration batch"
    );

    Err(MigrationError::ClusterUnreachable {
        cluster_id: environment.cluster_id,
        environment_id: environment.id,
        reason,
    })
}

/// Health gate decision for one workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Deletion may proceed
    Deletable,
    /// Deletion must not proceed
    Blocked(String),
}

/// Refuses deletion of GitOps workloads whose health cannot be read
pub struct HealthGate<'a> {
    store: &'a dyn HealthStatusStore,
}

impl<'a> HealthGate<'a> {
    /// Create a gate over the health status store
    pub fn new(store: &'a dyn HealthStatusStore) -> Self {
        Self { store }
    }

    /// Check whether `workload` may be deleted.
    ///
    /// A workload never observed has nothing to block on. Any recorded
    /// health permits deletion. A lookup failure blocks it.
    pub async fn check(&self, workload: &Workload) -> HealthVerdict {
        match self
            .store
            .get(workload.app_id, workload.environment_id)
            .await
        {
            Ok(Some(health)) => {
                debug!(workload_id = workload.id, health = %health.status, "Health known");
                HealthVerdict::Deletable
            }
            Ok(None) => HealthVerdict::Deletable,
            Err(e) if e.is_not_found() => HealthVerdict::Deletable,
            Err(e) => {
                warn!(workload_id = workload.id, error = %e, "Health lookup failed, blocking deletion");
                HealthVerdict::Blocked(format!("could not read application health: {}", e))
            }
        }
    }
}
