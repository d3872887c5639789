//! Collaborator interfaces consumed by the migration engine
//!
//! Each trait is a narrow seam around something the engine does not own:
//! persistence, the two deployment backends, and the clusters themselves.
//! Production implementations live in `keel-store` and `keel-backend`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::automock;

use crate::error::{BackendError, StoreError};
use crate::model::{
    AppStatus, DeploymentBackend, DeploymentConfig, Environment, GitOpsState, HealthStatus,
    OfferingMode, PatchType, ReleaseIdentifier, ReleaseInfo, ResourceNode, Workload,
    WorkloadVersion,
};

// =============================================================================
// Persistence
// =============================================================================

/// Read access to installed workloads
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Workloads in an environment currently on `backend`
    ///
    /// A non-empty `include` restricts the result to those ids; `exclude`
    /// removes ids. Both empty selects every workload on `backend`.
    async fn select_by_environment_and_backend(
        &self,
        environment_id: i64,
        backend: DeploymentBackend,
        include: &[i64],
        exclude: &[i64],
    ) -> Result<Vec<Workload>, StoreError>;

    /// Fresh copies of the given workloads
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Workload>, StoreError>;
}

/// Read access to environments
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    /// Look up an environment and its cluster
    async fn find_environment(&self, environment_id: i64)
        -> Result<Option<Environment>, StoreError>;
}

/// Deployment config persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeploymentConfigStore: Send + Sync {
    /// Load the active config, or a new unsaved one on `current` (with no
    /// id) when none exists. A new config is written by [`Self::upsert`], so
    /// every write for a workload lands in that one transaction.
    async fn get_or_create(
        &self,
        app_id: i64,
        environment_id: i64,
        current: DeploymentBackend,
    ) -> Result<DeploymentConfig, StoreError>;

    /// Persist a config in one transaction, optionally updating the owning
    /// application's offering mode in the same transaction
    async fn upsert(
        &self,
        config: &DeploymentConfig,
        offering: Option<OfferingMode>,
        actor_id: i32,
    ) -> Result<DeploymentConfig, StoreError>;
}

/// Last known GitOps health per (app, environment)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HealthStatusStore: Send + Sync {
    /// Health row, `None` when the workload was never observed
    async fn get(
        &self,
        app_id: i64,
        environment_id: i64,
    ) -> Result<Option<HealthStatus>, StoreError>;

    /// Remove the health row
    async fn delete(&self, app_id: i64, environment_id: i64) -> Result<(), StoreError>;
}

/// Deployable versions and "last deployed" bookkeeping
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeploymentHistoryStore: Send + Sync {
    /// Latest deployable version of a workload
    async fn latest_version(&self, workload_id: i64)
        -> Result<Option<WorkloadVersion>, StoreError>;

    /// Stamp the version as deployed by `backend` at `at`
    ///
    /// The release manager tracks this on the version row, the GitOps
    /// controller on a deployment-history row.
    async fn mark_deployed(
        &self,
        version: &WorkloadVersion,
        backend: DeploymentBackend,
        actor_id: i32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Submits deployment events; completion is not awaited
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RedeployTrigger: Send + Sync {
    /// Enqueue a deployment of `workload_version_id` on `backend`
    async fn submit_deployment_event(
        &self,
        workload_version_id: i64,
        backend: DeploymentBackend,
        actor_id: i32,
    ) -> Result<(), StoreError>;
}

// =============================================================================
// Deployment backends
// =============================================================================

/// Imperative, chart-based release manager
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReleaseManagerAdapter: Send + Sync {
    /// Uninstall a release; `Ok(false)` means the manager refused
    async fn delete(&self, release: &ReleaseIdentifier) -> Result<bool, BackendError>;

    /// Whether the release is still installed
    async fn exists(&self, release: &ReleaseIdentifier) -> Result<bool, BackendError>;

    /// Latest revision of a release
    async fn get_latest_release(
        &self,
        release: &ReleaseIdentifier,
    ) -> Result<ReleaseInfo, BackendError>;
}

/// Declarative GitOps controller
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GitOpsControllerAdapter: Send + Sync {
    /// Delete an application, cascading to its resources when `cascade`
    async fn delete(&self, app_name: &str, cascade: bool) -> Result<(), BackendError>;

    /// Application health and sync state
    async fn get_by_name(&self, app_name: &str) -> Result<AppStatus, BackendError>;

    /// Resources the application manages
    async fn get_resource_tree(&self, app_name: &str) -> Result<Vec<ResourceNode>, BackendError>;
}

/// GitOps configuration as seen by the platform
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GitOpsConfigReader: Send + Sync {
    /// Repository configuration and controller installation state
    async fn is_configured(&self) -> Result<GitOpsState, BackendError>;
}

// =============================================================================
// Clusters
// =============================================================================

/// Patches arbitrary resources on a workload cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait K8sPatcher: Send + Sync {
    /// Apply `payload` to `resource` on `cluster_id`
    async fn patch_resource(
        &self,
        cluster_id: i64,
        patch_type: PatchType,
        payload: &serde_json::Value,
        resource: &ResourceNode,
    ) -> Result<(), BackendError>;
}

/// Fast cluster liveness probe
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterReachability: Send + Sync {
    /// Whether the cluster's API server answers
    async fn is_reachable(&self, cluster_id: i64) -> Result<bool, BackendError>;
}
