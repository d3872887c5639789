//! Hand CRDs over to the release manager before leaving the GitOps controller
//!
//! Helm refuses to adopt resources it did not create unless they carry its
//! ownership metadata. CRDs survive an Argo CD cascade delete, so they are
//! labelled and annotated here first, otherwise the redeploy through Helm
//! would fail on them.

use serde_json::json;
use tracing::{debug, info};

use crate::error::{BackendError, MigrationError};
use crate::model::{PatchType, ResourceNode, Workload};
use crate::ports::{GitOpsControllerAdapter, K8sPatcher};

/// Kind of the resources that need ownership metadata
pub const CRD_KIND: &str = "CustomResourceDefinition";

/// Label Helm checks before adopting a resource
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
/// Annotation naming the owning release
pub const RELEASE_NAME_ANNOTATION: &str = "meta.helm.sh/release-name";
/// Annotation naming the owning release's namespace
pub const RELEASE_NAMESPACE_ANNOTATION: &str = "meta.helm.sh/release-namespace";

/// Strategic-merge payload marking a resource as owned by `release_name`
pub fn ownership_patch(release_name: &str, release_namespace: &str) -> serde_json::Value {
    json!({
        "metadata": {
            "labels": {
                MANAGED_BY_LABEL: "Helm",
            },
            "annotations": {
                RELEASE_NAME_ANNOTATION: release_name,
                RELEASE_NAMESPACE_ANNOTATION: release_namespace,
            },
        },
    })
}

/// Annotates the CRDs of GitOps workloads for release-manager adoption
pub struct PreMigrationPreparer<'a> {
    gitops: &'a dyn GitOpsControllerAdapter,
    patcher: &'a dyn K8sPatcher,
}

impl<'a> PreMigrationPreparer<'a> {
    /// Create a preparer
    pub fn new(gitops: &'a dyn GitOpsControllerAdapter, patcher: &'a dyn K8sPatcher) -> Self {
        Self { gitops, patcher }
    }

    /// Patch every CRD of every workload, stopping at the first failure.
    ///
    /// A partially annotated set is unsafe to migrate, so the caller must
    /// abort the batch on error.
    pub async fn prepare_all(&self, workloads: &[Workload]) -> Result<usize, MigrationError> {
        let mut patched = 0;
        for workload in workloads {
            patched += self.prepare(workload).await?;
        }
        if patched > 0 {
            info!(patched, "Annotated CRDs for release manager adoption");
        }
        Ok(patched)
    }

    /// Patch the CRDs of one workload, returning how many were patched
    pub async fn prepare(&self, workload: &Workload) -> Result<usize, MigrationError> {
        // Unresolved workloads fail later in dispatch
        if !workload.has_identity() {
            return Ok(0);
        }

        let app_name = workload.release_name();
        let tree = match self.gitops.get_resource_tree(&app_name).await {
            Ok(tree) => tree,
            Err(BackendError::NotFound(_)) => {
                debug!(workload_id = workload.id, application = %app_name, "No application, nothing to prepare");
                return Ok(0);
            }
            Err(source) => {
                return Err(MigrationError::PrepareFailed {
                    workload_id: workload.id,
                    resource: format!("Application/{}", app_name),
                    source,
                })
            }
        };

        let payload = ownership_patch(&app_name, &workload.namespace);
        let crds: Vec<&ResourceNode> = tree.iter().filter(|n| n.kind == CRD_KIND).collect();
        for node in &crds {
            debug!(workload_id = workload.id, crd = %node.name, "Patching CRD ownership");
            self.patcher
                .patch_resource(workload.cluster_id, PatchType::StrategicMerge, &payload, node)
                .await
                .map_err(|source| MigrationError::PrepareFailed {
                    workload_id: workload.id,
                    resource: format!("{}/{}", node.kind, node.name),
                    source,
                })?;
        }
        Ok(crds.len())
    }
}
