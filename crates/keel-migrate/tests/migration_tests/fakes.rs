//! In-memory platform shared by the migration stories
//!
//! One [`FakePlatform`] plays every collaborator. Upserting a deployment
//! config moves the workload to the config's backend, the way the real
//! store derives a workload's backend from its active config.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keel_migrate::model::{
    AppStatus, DeploymentConfig, Environment, GitOpsState, HealthStatus, OfferingMode, PatchType,
    ReleaseIdentifier, ReleaseInfo, ResourceNode, WorkloadVersion,
};
use keel_migrate::ports::*;
use keel_migrate::{
    BackendError, DeploymentBackend, MigrationConfig, MigrationContext, Migrator, StoreError,
    Workload,
};

pub const ENV_ID: i64 = 7;
pub const CLUSTER_ID: i64 = 1;

#[derive(Default)]
pub struct State {
    pub workloads: BTreeMap<i64, Workload>,
    pub configs: HashMap<(i64, i64), DeploymentConfig>,
    pub offering: HashMap<i64, OfferingMode>,
    pub health: HashMap<(i64, i64), HealthStatus>,
    pub failing_health_apps: HashSet<i64>,
    pub releases: HashSet<String>,
    pub applications: HashSet<String>,
    pub failing_deletes: HashSet<String>,
    pub crds: HashMap<String, Vec<ResourceNode>>,
    pub versions: HashMap<i64, WorkloadVersion>,
    pub gitops: GitOpsState,
    pub reachable: bool,

    pub deletes: Vec<(DeploymentBackend, String)>,
    pub lookups: Vec<String>,
    pub upserts: Vec<(DeploymentConfig, Option<OfferingMode>)>,
    pub patched: Vec<String>,
    pub marked: Vec<(i64, DeploymentBackend)>,
    pub events: Vec<(i64, DeploymentBackend)>,
}

pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    /// Environment 7 on a reachable cluster with GitOps fully set up
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                gitops: GitOpsState {
                    configured: true,
                    controller_installed: true,
                },
                reachable: true,
                ..State::default()
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Add a workload with its object present on `backend`
    pub fn install(&self, id: i64, backend: DeploymentBackend) -> Workload {
        let w = workload(id, backend);
        let mut state = self.state();
        match backend {
            DeploymentBackend::ReleaseManager => state.releases.insert(w.release_name()),
            DeploymentBackend::GitOpsController => state.applications.insert(w.release_name()),
        };
        state.versions.insert(
            id,
            WorkloadVersion {
                id: 1000 + id,
                workload_id: id,
                artifact_id: 1,
            },
        );
        state.workloads.insert(id, w.clone());
        w
    }

    /// Add a workload already flipped to `desired` by a phase 1 call.
    /// The old backend still holds it while `lingering` is set.
    pub fn flipped(&self, id: i64, desired: DeploymentBackend, lingering: bool) -> Workload {
        let w = self.install(id, desired);
        let mut state = self.state();
        state.releases.remove(&w.release_name());
        state.applications.remove(&w.release_name());
        if lingering {
            match desired.other() {
                DeploymentBackend::ReleaseManager => state.releases.insert(w.release_name()),
                DeploymentBackend::GitOpsController => {
                    state.applications.insert(w.release_name())
                }
            };
        }
        w
    }

    /// Add a Helm release created outside keel and linked in under a
    /// synthetic app name; Helm knows it as `release`
    pub fn link(&self, id: i64, release: &str) -> Workload {
        let w = Workload {
            app_name: format!("linked-{:04x}", id),
            display_name: Some(release.to_string()),
            linked_release: true,
            ..workload(id, DeploymentBackend::ReleaseManager)
        };
        let mut state = self.state();
        state.releases.insert(release.to_string());
        state.versions.insert(
            id,
            WorkloadVersion {
                id: 1000 + id,
                workload_id: id,
                artifact_id: 1,
            },
        );
        state.workloads.insert(id, w.clone());
        w
    }

    pub fn migrator(self: &Arc<Self>) -> Migrator {
        Migrator::new(
            MigrationContext {
                workloads: self.clone(),
                environments: self.clone(),
                configs: self.clone(),
                health: self.clone(),
                history: self.clone(),
                redeploy: self.clone(),
                release_manager: self.clone(),
                gitops: self.clone(),
                gitops_config: self.clone(),
                patcher: self.clone(),
                reachability: self.clone(),
            },
            MigrationConfig {
                concurrency: 3,
                ..MigrationConfig::default()
            },
        )
    }
}

pub fn workload(id: i64, backend: DeploymentBackend) -> Workload {
    Workload {
        id,
        app_id: 100 + id,
        environment_id: ENV_ID,
        app_name: format!("svc{}", id),
        display_name: None,
        environment_name: "prod".to_string(),
        namespace: "apps".to_string(),
        cluster_id: CLUSTER_ID,
        current_backend: backend,
        linked_release: false,
    }
}

fn not_found(what: &str) -> BackendError {
    BackendError::NotFound(format!("{}: not found", what))
}

#[async_trait]
impl WorkloadStore for FakePlatform {
    async fn select_by_environment_and_backend(
        &self,
        environment_id: i64,
        backend: DeploymentBackend,
        include: &[i64],
        exclude: &[i64],
    ) -> Result<Vec<Workload>, StoreError> {
        Ok(self
            .state()
            .workloads
            .values()
            .filter(|w| w.environment_id == environment_id && w.current_backend == backend)
            .filter(|w| include.is_empty() || include.contains(&w.id))
            .filter(|w| !exclude.contains(&w.id))
            .cloned()
            .collect())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Workload>, StoreError> {
        let state = self.state();
        Ok(ids
            .iter()
            .filter_map(|id| state.workloads.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl EnvironmentStore for FakePlatform {
    async fn find_environment(
        &self,
        environment_id: i64,
    ) -> Result<Option<Environment>, StoreError> {
        Ok((environment_id == ENV_ID).then(|| Environment {
            id: ENV_ID,
            name: "prod".to_string(),
            cluster_id: CLUSTER_ID,
            namespace: "apps".to_string(),
        }))
    }
}

#[async_trait]
impl DeploymentConfigStore for FakePlatform {
    async fn get_or_create(
        &self,
        app_id: i64,
        environment_id: i64,
        current: DeploymentBackend,
    ) -> Result<DeploymentConfig, StoreError> {
        Ok(self
            .state()
            .configs
            .get(&(app_id, environment_id))
            .cloned()
            .unwrap_or(DeploymentConfig {
                id: None,
                app_id,
                environment_id,
                deployment_backend: current,
                release_configuration: None,
                active: true,
            }))
    }

    async fn upsert(
        &self,
        config: &DeploymentConfig,
        offering: Option<OfferingMode>,
        _actor_id: i32,
    ) -> Result<DeploymentConfig, StoreError> {
        let mut state = self.state();
        let key = (config.app_id, config.environment_id);
        state.configs.insert(key, config.clone());
        if let Some(mode) = offering {
            state.offering.insert(config.app_id, mode);
        }
        for w in state.workloads.values_mut() {
            if w.app_id == config.app_id && w.environment_id == config.environment_id {
                w.current_backend = config.deployment_backend;
            }
        }
        state.upserts.push((config.clone(), offering));
        Ok(config.clone())
    }
}

#[async_trait]
impl HealthStatusStore for FakePlatform {
    async fn get(
        &self,
        app_id: i64,
        environment_id: i64,
    ) -> Result<Option<HealthStatus>, StoreError> {
        let state = self.state();
        if state.failing_health_apps.contains(&app_id) {
            return Err(StoreError::Database("health lookup timed out".to_string()));
        }
        Ok(state.health.get(&(app_id, environment_id)).cloned())
    }

    async fn delete(&self, app_id: i64, environment_id: i64) -> Result<(), StoreError> {
        match self.state().health.remove(&(app_id, environment_id)) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound("app_status".to_string())),
        }
    }
}

#[async_trait]
impl DeploymentHistoryStore for FakePlatform {
    async fn latest_version(
        &self,
        workload_id: i64,
    ) -> Result<Option<WorkloadVersion>, StoreError> {
        Ok(self.state().versions.get(&workload_id).cloned())
    }

    async fn mark_deployed(
        &self,
        version: &WorkloadVersion,
        backend: DeploymentBackend,
        _actor_id: i32,
        _at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.state().marked.push((version.id, backend));
        Ok(())
    }
}

#[async_trait]
impl RedeployTrigger for FakePlatform {
    async fn submit_deployment_event(
        &self,
        workload_version_id: i64,
        backend: DeploymentBackend,
        _actor_id: i32,
    ) -> Result<(), StoreError> {
        self.state().events.push((workload_version_id, backend));
        Ok(())
    }
}

#[async_trait]
impl ReleaseManagerAdapter for FakePlatform {
    async fn delete(&self, release: &ReleaseIdentifier) -> Result<bool, BackendError> {
        let mut state = self.state();
        state
            .deletes
            .push((DeploymentBackend::ReleaseManager, release.release_name.clone()));
        if state.failing_deletes.contains(&release.release_name) {
            return Err(BackendError::other("uninstall: timed out waiting for the condition"));
        }
        if state.releases.remove(&release.release_name) {
            Ok(true)
        } else {
            Err(not_found("release"))
        }
    }

    async fn exists(&self, release: &ReleaseIdentifier) -> Result<bool, BackendError> {
        let mut state = self.state();
        state.lookups.push(release.release_name.clone());
        Ok(state.releases.contains(&release.release_name))
    }

    async fn get_latest_release(
        &self,
        release: &ReleaseIdentifier,
    ) -> Result<ReleaseInfo, BackendError> {
        if !self.state().releases.contains(&release.release_name) {
            return Err(not_found("release"));
        }
        Ok(ReleaseInfo {
            name: release.release_name.clone(),
            namespace: release.namespace.clone(),
            revision: 1,
            status: "uninstalling".to_string(),
        })
    }
}

#[async_trait]
impl GitOpsControllerAdapter for FakePlatform {
    async fn delete(&self, app_name: &str, _cascade: bool) -> Result<(), BackendError> {
        let mut state = self.state();
        state
            .deletes
            .push((DeploymentBackend::GitOpsController, app_name.to_string()));
        if state.failing_deletes.contains(app_name) {
            return Err(BackendError::other("application controller did not respond"));
        }
        if state.applications.remove(app_name) {
            Ok(())
        } else {
            Err(not_found("application"))
        }
    }

    async fn get_by_name(&self, app_name: &str) -> Result<AppStatus, BackendError> {
        if !self.state().applications.contains(app_name) {
            return Err(not_found("application"));
        }
        Ok(AppStatus {
            name: app_name.to_string(),
            health: "Healthy".to_string(),
            sync: "Synced".to_string(),
        })
    }

    async fn get_resource_tree(&self, app_name: &str) -> Result<Vec<ResourceNode>, BackendError> {
        let state = self.state();
        if !state.applications.contains(app_name) {
            return Err(not_found("application"));
        }
        Ok(state.crds.get(app_name).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl GitOpsConfigReader for FakePlatform {
    async fn is_configured(&self) -> Result<GitOpsState, BackendError> {
        Ok(self.state().gitops)
    }
}

#[async_trait]
impl K8sPatcher for FakePlatform {
    async fn patch_resource(
        &self,
        _cluster_id: i64,
        _patch_type: PatchType,
        _payload: &serde_json::Value,
        resource: &ResourceNode,
    ) -> Result<(), BackendError> {
        self.state().patched.push(resource.name.clone());
        Ok(())
    }
}

#[async_trait]
impl ClusterReachability for FakePlatform {
    async fn is_reachable(&self, _cluster_id: i64) -> Result<bool, BackendError> {
        Ok(self.state().reachable)
    }
}
