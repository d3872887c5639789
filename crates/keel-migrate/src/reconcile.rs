//! Flip persisted deployment configs to the new backend

use tracing::{debug, error, info, warn};

use crate::error::{InconsistentWorkload, StoreError};
use crate::model::{DeploymentBackend, DeploymentConfig, OfferingMode, ReleaseConfiguration, Workload};
use crate::ports::{DeploymentConfigStore, HealthStatusStore};

/// Persists the backend switch for migrated workloads
pub struct ConfigReconciler<'a> {
    configs: &'a dyn DeploymentConfigStore,
    health: &'a dyn HealthStatusStore,
}

impl<'a> ConfigReconciler<'a> {
    /// Create a reconciler
    pub fn new(configs: &'a dyn DeploymentConfigStore, health: &'a dyn HealthStatusStore) -> Self {
        Self { configs, health }
    }

    /// Point the workload's config at `desired`.
    ///
    /// Runs after the old backend already deleted the workload. A failure
    /// here cannot be rolled back and is returned with enough context for
    /// an operator to re-run reconciliation for this workload alone.
    pub async fn reconcile(
        &self,
        workload: &Workload,
        desired: DeploymentBackend,
        actor_id: i32,
    ) -> Result<DeploymentConfig, InconsistentWorkload> {
        let inconsistent = |e: StoreError| {
            error!(
                workload_id = workload.id,
                app_id = workload.app_id,
                environment_id = workload.environment_id,
                deleted_from = %workload.current_backend,
                desired = %desired,
                error = %e,
                "Workload deleted from old backend but config not updated"
            );
            InconsistentWorkload {
                workload_id: workload.id,
                app_id: workload.app_id,
                environment_id: workload.environment_id,
                deleted_from: workload.current_backend,
                desired,
                message: e.to_string(),
            }
        };

        let mut config = self
            .configs
            .get_or_create(workload.app_id, workload.environment_id, workload.current_backend)
            .await
            .map_err(&inconsistent)?;

        config.deployment_backend = desired;
        config.active = true;
        let repo_url = config
            .release_configuration
            .take()
            .and_then(|rc| rc.repo_url);
        config.release_configuration = Some(ReleaseConfiguration {
            release_name: workload.release_name(),
            release_namespace: workload.namespace.clone(),
            repo_url,
        });

        // A linked release becomes a managed application once GitOps owns it
        let offering = (desired == DeploymentBackend::GitOpsController).then_some(OfferingMode::Full);

        let saved = self
            .configs
            .upsert(&config, offering, actor_id)
            .await
            .map_err(&inconsistent)?;
        info!(workload_id = workload.id, backend = %desired, "Deployment config updated");
        Ok(saved)
    }

    /// Drop state the new backend no longer needs.
    ///
    /// GitOps health rows are orphaned once a workload is back on the
    /// release manager. Failures are logged only.
    pub async fn cleanup(&self, workload: &Workload, desired: DeploymentBackend) {
        if desired != DeploymentBackend::ReleaseManager {
            return;
        }
        match self
            .health
            .delete(workload.app_id, workload.environment_id)
            .await
        {
            Ok(()) => debug!(workload_id = workload.id, "Removed GitOps health row"),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(workload_id = workload.id, error = %e, "Failed to remove GitOps health row")
            }
        }
    }
}
