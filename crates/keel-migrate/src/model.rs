//! Data model for backend migrations
//!
//! Workloads and deployment configs are owned by the persistence layer.
//! The engine holds them only for the duration of one phase call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Deployment backend
// =============================================================================

/// The two interchangeable deployment mechanisms
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentBackend {
    /// Imperative, chart-based (Helm)
    #[serde(rename = "helm")]
    ReleaseManager,
    /// Declarative, reconciliation-based (Argo CD)
    #[serde(rename = "argo_cd")]
    GitOpsController,
}

impl DeploymentBackend {
    /// The backend a migration toward `self` moves away from
    pub fn other(self) -> Self {
        match self {
            DeploymentBackend::ReleaseManager => DeploymentBackend::GitOpsController,
            DeploymentBackend::GitOpsController => DeploymentBackend::ReleaseManager,
        }
    }

    /// Stable identifier used in persistence and logs
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentBackend::ReleaseManager => "helm",
            DeploymentBackend::GitOpsController => "argo_cd",
        }
    }
}

impl fmt::Display for DeploymentBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "helm" | "release_manager" => Ok(DeploymentBackend::ReleaseManager),
            "argo_cd" | "argocd" | "gitops" => Ok(DeploymentBackend::GitOpsController),
            other => Err(format!("unknown deployment backend '{}'", other)),
        }
    }
}

// =============================================================================
// Workload
// =============================================================================

/// One application installed in one environment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    /// Persistent identifier
    pub id: i64,
    /// Owning application
    pub app_id: i64,
    /// Environment the app is installed in
    pub environment_id: i64,
    /// Stored application name
    pub app_name: String,
    /// Name shown to users; for linked releases this is the real release name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Environment name
    pub environment_name: String,
    /// Kubernetes namespace the workload runs in
    pub namespace: String,
    /// Cluster backing the environment
    pub cluster_id: i64,
    /// Backend currently deploying this workload
    pub current_backend: DeploymentBackend,
    /// Release created outside keel and linked in afterwards
    #[serde(default)]
    pub linked_release: bool,
}

impl Workload {
    /// Substitute the real release name for externally linked releases.
    ///
    /// Linked releases are stored under a synthetic app name; every backend
    /// call must use the name the backend actually knows.
    pub fn normalize(mut self) -> Self {
        if self.linked_release {
            if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
                self.app_name = name.to_string();
            }
        }
        self
    }

    /// Name of the Helm release / Argo CD Application for this workload
    pub fn release_name(&self) -> String {
        if self.linked_release {
            self.app_name.clone()
        } else {
            format!("{}-{}", self.app_name, self.environment_name)
        }
    }

    /// Both app and environment names resolved
    pub fn has_identity(&self) -> bool {
        !self.app_name.is_empty() && !self.environment_name.is_empty()
    }

    /// Addressing for release-manager calls
    pub fn release_identifier(&self) -> ReleaseIdentifier {
        ReleaseIdentifier {
            release_name: self.release_name(),
            namespace: self.namespace.clone(),
            cluster_id: self.cluster_id,
        }
    }
}

/// Environment with the cluster that backs it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Environment id
    pub id: i64,
    /// Environment name
    pub name: String,
    /// Backing cluster
    pub cluster_id: i64,
    /// Default namespace
    pub namespace: String,
}

/// How the release manager addresses a release
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReleaseIdentifier {
    /// Release name
    pub release_name: String,
    /// Release namespace
    pub namespace: String,
    /// Cluster the release is installed on
    pub cluster_id: i64,
}

// =============================================================================
// Deployment configuration
// =============================================================================

/// Whether an application is fully managed or only observed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferingMode {
    /// Linked release, limited management
    Lite,
    /// Fully managed application
    Full,
}

impl OfferingMode {
    /// Stable identifier used in persistence
    pub fn as_str(self) -> &'static str {
        match self {
            OfferingMode::Lite => "lite",
            OfferingMode::Full => "full",
        }
    }
}

/// Backend-specific addressing for a workload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseConfiguration {
    /// Release / Application name
    pub release_name: String,
    /// Namespace the release is installed into
    pub release_namespace: String,
    /// Git repository the GitOps controller syncs from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

/// Persisted deployment backend choice for (app, environment)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// Row id, `None` until persisted
    pub id: Option<i64>,
    /// Application
    pub app_id: i64,
    /// Environment
    pub environment_id: i64,
    /// Backend deploying this workload
    pub deployment_backend: DeploymentBackend,
    /// Backend-specific addressing
    pub release_configuration: Option<ReleaseConfiguration>,
    /// Only one active config exists per (app, environment)
    pub active: bool,
}

// =============================================================================
// Collaborator payloads
// =============================================================================

/// Last known reconciliation health of a GitOps-controlled workload
#[derive(Clone, Debug, PartialEq)]
pub struct HealthStatus {
    /// Application
    pub app_id: i64,
    /// Environment
    pub environment_id: i64,
    /// Health as reported by the controller (Healthy, Progressing, ...)
    pub status: String,
}

/// Latest deployable version of a workload
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadVersion {
    /// Version row id
    pub id: i64,
    /// Workload the version belongs to
    pub workload_id: i64,
    /// Artifact deployed by this version
    pub artifact_id: i64,
}

/// Release metadata returned by the release manager
#[derive(Clone, Debug, PartialEq)]
pub struct ReleaseInfo {
    /// Release name
    pub name: String,
    /// Release namespace
    pub namespace: String,
    /// Latest revision number
    pub revision: i64,
    /// Release status (deployed, failed, uninstalling, ...)
    pub status: String,
}

/// Application status returned by the GitOps controller
#[derive(Clone, Debug, PartialEq)]
pub struct AppStatus {
    /// Application name
    pub name: String,
    /// Health status (Healthy, Progressing, Degraded, ...)
    pub health: String,
    /// Sync status (Synced, OutOfSync, ...)
    pub sync: String,
}

/// A node of the GitOps controller's resource tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceNode {
    /// API group, empty for the core group
    pub group: String,
    /// API version
    pub version: String,
    /// Kind
    pub kind: String,
    /// Object name
    pub name: String,
    /// Namespace, `None` for cluster-scoped objects
    pub namespace: Option<String>,
}

/// Backend-agnostic view of a workload on a backend
#[derive(Clone, Debug, PartialEq)]
pub struct BackendStatus {
    /// Name the backend knows the workload by
    pub name: String,
    /// Backend-reported state
    pub state: String,
}

/// GitOps settings read once per batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GitOpsState {
    /// A GitOps repository provider is configured
    pub configured: bool,
    /// The GitOps controller is installed
    pub controller_installed: bool,
}

/// Kubernetes patch strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchType {
    /// Strategic merge patch
    StrategicMerge,
    /// JSON merge patch
    Merge,
}

// =============================================================================
// Request / response
// =============================================================================

/// Input to both migration phases
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRequest {
    /// Environment whose workloads migrate
    pub environment_id: i64,
    /// Backend to migrate to
    pub desired_backend: DeploymentBackend,
    /// Only these workloads, when non-empty
    #[serde(default)]
    pub include_workload_ids: Vec<i64>,
    /// Never these workloads
    #[serde(default)]
    pub exclude_workload_ids: Vec<i64>,
    /// User performing the migration
    pub actor_id: i32,
}

impl MigrationRequest {
    /// Create a request covering every workload in an environment
    pub fn new(environment_id: i64, desired_backend: DeploymentBackend, actor_id: i32) -> Self {
        Self {
            environment_id,
            desired_backend,
            include_workload_ids: Vec::new(),
            exclude_workload_ids: Vec::new(),
            actor_id,
        }
    }

    /// Restrict to the given workloads
    pub fn including(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.include_workload_ids = ids.into_iter().collect();
        self
    }

    /// Skip the given workloads
    pub fn excluding(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.exclude_workload_ids = ids.into_iter().collect();
        self
    }

    /// Backend phase 1 migrates away from
    pub fn source_backend(&self) -> DeploymentBackend {
        self.desired_backend.other()
    }
}

/// Per-workload result status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// Deletion issued on the old backend
    Initiated,
    /// Old backend confirmed empty and redeploy submitted
    Success,
    /// Unexpected failure
    Failed,
    /// Old backend still has the workload; retry later
    NotYetDeleted,
    /// Caller lacks permission on the backend
    PermissionDenied,
}

impl MigrationStatus {
    /// Statuses that land in the successful bucket
    pub fn is_success(self) -> bool {
        matches!(self, MigrationStatus::Initiated | MigrationStatus::Success)
    }
}

/// Outcome record for one workload in one phase call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatus {
    /// Workload
    pub workload_id: i64,
    /// Application
    pub app_id: i64,
    /// Application (release) name
    pub app_name: String,
    /// Environment
    pub environment_id: i64,
    /// Environment name
    pub environment_name: String,
    /// Empty on success
    pub error: String,
    /// Outcome
    pub status: MigrationStatus,
}

/// Result of a phase call, partitioning every selected workload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResponse {
    /// Environment the batch ran against
    pub environment_id: i64,
    /// Backend migrated to
    pub desired_backend: DeploymentBackend,
    /// Workloads that succeeded
    pub successful_workloads: Vec<ChangeStatus>,
    /// Workloads that failed, with reasons
    pub failed_workloads: Vec<ChangeStatus>,
}

impl MigrationResponse {
    /// Empty response for a batch with nothing to do
    pub fn empty(environment_id: i64, desired_backend: DeploymentBackend) -> Self {
        Self {
            environment_id,
            desired_backend,
            successful_workloads: Vec::new(),
            failed_workloads: Vec::new(),
        }
    }

    /// Total workloads accounted for
    pub fn len(&self) -> usize {
        self.successful_workloads.len() + self.failed_workloads.len()
    }

    /// No workloads were selected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every workload succeeded
    pub fn is_complete(&self) -> bool {
        self.failed_workloads.is_empty()
    }

    /// Workloads still waiting for the old backend to let go
    pub fn pending(&self) -> Vec<i64> {
        self.failed_workloads
            .iter()
            .filter(|c| c.status == MigrationStatus::NotYetDeleted)
            .map(|c| c.workload_id)
            .collect()
    }
}
