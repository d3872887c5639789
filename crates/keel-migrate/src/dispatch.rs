//! Per-workload deletion from the old backend (phase 1)

use tracing::{debug, info, warn};

use crate::accumulator::Outcome;
use crate::backend::Backends;
use crate::error::BackendError;
use crate::gate::{HealthGate, HealthVerdict};
use crate::model::{DeploymentBackend, GitOpsState, MigrationStatus, Workload};
use crate::ports::HealthStatusStore;

/// Reason recorded for workloads without app or environment name
pub const UNRESOLVED_IDENTITY: &str = "could not resolve app/environment name";
/// Reason recorded when migrating to an unconfigured GitOps controller
pub const GITOPS_NOT_CONFIGURED: &str = "GitOps not configured";
/// Reason recorded when deleting from a GitOps controller that is not installed
pub const GITOPS_NOT_INSTALLED: &str = "GitOps controller not installed";

/// Deletes one workload from its current backend
///
/// The GitOps state is read once per batch by the orchestrator and shared
/// by every dispatch in that batch.
pub struct DeletionDispatcher<'a> {
    backends: &'a Backends,
    health: HealthGate<'a>,
    gitops: GitOpsState,
    desired: DeploymentBackend,
}

impl<'a> DeletionDispatcher<'a> {
    /// Create a dispatcher for a batch migrating to `desired`
    pub fn new(
        backends: &'a Backends,
        health: &'a dyn HealthStatusStore,
        gitops: GitOpsState,
        desired: DeploymentBackend,
    ) -> Self {
        Self {
            backends,
            health: HealthGate::new(health),
            gitops,
            desired,
        }
    }

    /// Run the checks and the delete for one workload
    pub async fn dispatch(&self, workload: &Workload) -> Outcome {
        if !workload.has_identity() {
            warn!(workload_id = workload.id, "Workload has no app or environment name");
            return Outcome::failed(UNRESOLVED_IDENTITY);
        }

        let source = workload.current_backend;
        if source == DeploymentBackend::GitOpsController {
            if let HealthVerdict::Blocked(reason) = self.health.check(workload).await {
                return Outcome::failed(reason);
            }
        }

        if self.desired == DeploymentBackend::GitOpsController && !self.gitops.configured {
            return Outcome::failed(GITOPS_NOT_CONFIGURED);
        }
        if source == DeploymentBackend::GitOpsController && !self.gitops.controller_installed {
            return Outcome::failed(GITOPS_NOT_INSTALLED);
        }

        debug!(
            workload_id = workload.id,
            release = %workload.release_name(),
            backend = %source,
            "Deleting workload from old backend"
        );
        match self.backends.get(source).delete(workload).await {
            Ok(()) => {
                info!(workload_id = workload.id, backend = %source, "Deletion initiated");
                Outcome::Succeeded(MigrationStatus::Initiated)
            }
            Err(BackendError::PermissionDenied(msg)) => {
                warn!(workload_id = workload.id, error = %msg, "Deletion forbidden");
                Outcome::failed_with(
                    MigrationStatus::PermissionDenied,
                    format!("permission denied deleting from {}: {}", source, msg),
                )
            }
            Err(e) => {
                warn!(workload_id = workload.id, error = %e, "Deletion failed");
                Outcome::failed(format!("failed to delete from {}: {}", source, e))
            }
        }
    }
}
